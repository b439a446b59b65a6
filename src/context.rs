// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for the `MySQLCluster` controller.
//!
//! The controller receives an `Arc<Context>` holding:
//! - Kubernetes client for status writes
//! - The certificate manager, with its store and event publisher injected
//! - Requeue settings

use std::sync::Arc;
use std::time::Duration;

use kube::Client;

use crate::constants::{ERROR_REQUEUE_DURATION_SECS, REQUEUE_PENDING_SECS, REQUEUE_READY_SECS};
use crate::reconcilers::certificates::CertificateManager;

/// Shared context passed to the `MySQLCluster` reconciler.
#[derive(Clone)]
pub struct Context {
    /// Kubernetes client for API operations
    pub client: Client,

    /// Certificate lifecycle manager
    pub certificates: Arc<CertificateManager>,

    /// Requeue intervals
    pub requeue: RequeueSettings,
}

/// How long to wait before reconciling a cluster again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RequeueSettings {
    /// All certificate secrets exist
    pub ready: Duration,
    /// Waiting for cert-manager to issue a secret
    pub pending: Duration,
    /// The last reconcile failed
    pub error: Duration,
}

impl Default for RequeueSettings {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(REQUEUE_READY_SECS),
            pending: Duration::from_secs(REQUEUE_PENDING_SECS),
            error: Duration::from_secs(ERROR_REQUEUE_DURATION_SECS),
        }
    }
}
