// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `MySQLCluster` reconciliation logic.
//!
//! A thin driver around
//! [`CertificateManager`](crate::reconcilers::certificates::CertificateManager): when TLS is configured it
//! ensures the three certificates, checks that their secrets were issued, and
//! reports the result in the `CertificatesReady` status condition.
//!
//! The returned [`Action`] requeues sooner while secrets are still pending.

use std::sync::Arc;
use std::time::Instant;

use kube::runtime::controller::Action;
use kube::ResourceExt;
use tracing::{debug, error, info, warn};

use crate::constants::KIND_MYSQL_CLUSTER;
use crate::context::{Context, RequeueSettings};
use crate::crd::MySQLCluster;
use crate::errors::{OperatorError, Result};
use crate::metrics;
use crate::reconcilers::retry::jittered_requeue;
use crate::reconcilers::status::MySQLClusterStatusUpdater;

/// Condition type reporting whether the certificate secrets exist
pub const CONDITION_CERTIFICATES_READY: &str = "CertificatesReady";

/// All three secrets were issued
pub const REASON_SECRETS_ISSUED: &str = "SecretsIssued";

/// cert-manager has not issued every secret yet
pub const REASON_SECRET_PENDING: &str = "SecretPending";

/// Certificates could not be ensured
pub const REASON_CERTIFICATE_ERROR: &str = "CertificateError";

/// Where a cluster's certificates stand after one pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CertificateReadiness {
    /// TLS is not configured; nothing to manage
    Disabled,
    /// Every secret exists
    Ready,
    /// Waiting for the named secret
    Pending { secret: String },
}

impl CertificateReadiness {
    /// Interpret the result of `check_certificates_ready`.
    ///
    /// A missing secret means "not issued yet". Every other error is returned.
    ///
    /// # Errors
    ///
    /// Any error other than a missing `Secret`.
    pub fn from_check(result: Result<()>) -> Result<Self> {
        match result {
            Ok(()) => Ok(Self::Ready),
            Err(OperatorError::NotFound { kind, name, .. }) if kind == "Secret" => {
                Ok(Self::Pending { secret: name })
            }
            Err(e) => Err(e),
        }
    }

    /// The `CertificatesReady` condition as (status, reason, message), if any.
    #[must_use]
    pub fn condition(&self) -> Option<(&'static str, &'static str, String)> {
        match self {
            Self::Disabled => None,
            Self::Ready => Some((
                "True",
                REASON_SECRETS_ISSUED,
                "All certificate secrets exist".to_string(),
            )),
            Self::Pending { secret } => Some((
                "False",
                REASON_SECRET_PENDING,
                format!("Waiting for secret {secret} to be issued"),
            )),
        }
    }

    /// How long to wait before the next pass.
    #[must_use]
    pub fn requeue_after(&self, settings: &RequeueSettings) -> std::time::Duration {
        match self {
            Self::Disabled | Self::Ready => settings.ready,
            Self::Pending { .. } => settings.pending,
        }
    }
}

/// Reconciles a `MySQLCluster` resource.
///
/// # Errors
///
/// Returns certificate and status errors unmodified; the controller's
/// [`error_policy`] decides when to retry.
pub async fn reconcile_mysqlcluster(
    cluster: Arc<MySQLCluster>,
    ctx: Arc<Context>,
) -> Result<Action> {
    let start = Instant::now();
    let result = reconcile(&cluster, &ctx).await;

    match &result {
        Ok(_) => metrics::record_reconciliation_success(KIND_MYSQL_CLUSTER, start.elapsed()),
        Err(e) => {
            error!(
                cluster = %cluster.name_any(),
                namespace = %cluster.namespace().unwrap_or_default(),
                error = %e,
                "Failed to reconcile MySQLCluster"
            );
            metrics::record_reconciliation_error(KIND_MYSQL_CLUSTER, start.elapsed());
        }
    }
    result
}

async fn reconcile(cluster: &MySQLCluster, ctx: &Context) -> Result<Action> {
    let namespace = cluster.namespace().unwrap_or_default();
    let name = cluster.name_any();
    debug!(
        namespace = %namespace,
        name = %name,
        generation = ?cluster.metadata.generation,
        "Starting MySQLCluster reconciliation"
    );

    let mut status = MySQLClusterStatusUpdater::new(cluster);
    let readiness = match ensure_certificates(cluster, ctx).await {
        Ok(readiness) => readiness,
        Err(e) => {
            status.set_condition(
                CONDITION_CERTIFICATES_READY,
                "False",
                REASON_CERTIFICATE_ERROR,
                &e.to_string(),
            );
            if let Err(status_err) = status.apply(&ctx.client).await {
                warn!(
                    cluster = %name,
                    error = %status_err,
                    "Failed to record certificate error in status"
                );
            }
            return Err(e);
        }
    };

    if let Some((state, reason, message)) = readiness.condition() {
        status.set_condition(CONDITION_CERTIFICATES_READY, state, reason, &message);
    }
    status.set_observed_generation(cluster.metadata.generation);
    status.apply(&ctx.client).await?;

    if let CertificateReadiness::Pending { secret } = &readiness {
        info!(
            cluster = %name,
            namespace = %namespace,
            secret = %secret,
            "Certificate secret not issued yet"
        );
    }

    let requeue = readiness.requeue_after(&ctx.requeue);
    debug!(cluster = %name, requeue_secs = requeue.as_secs(), "MySQLCluster reconciled");
    Ok(Action::requeue(requeue))
}

async fn ensure_certificates(
    cluster: &MySQLCluster,
    ctx: &Context,
) -> Result<CertificateReadiness> {
    if cluster.spec.tls.is_none() {
        debug!(cluster = %cluster.name_any(), "TLS not configured, skipping certificates");
        return Ok(CertificateReadiness::Disabled);
    }

    ctx.certificates.manage_tls(cluster).await?;
    CertificateReadiness::from_check(ctx.certificates.check_certificates_ready(cluster).await)
}

/// Requeue a failed `MySQLCluster` after the jittered error interval.
///
/// Configuration errors are requeued at the same interval.
#[must_use]
pub fn error_policy(
    _cluster: Arc<MySQLCluster>,
    err: &OperatorError,
    ctx: Arc<Context>,
) -> Action {
    debug!(error = %err, class = ?err.class(), "Requeueing MySQLCluster after error");
    Action::requeue(jittered_requeue(ctx.requeue.error))
}

#[cfg(test)]
#[path = "mysqlcluster_tests.rs"]
mod mysqlcluster_tests;
