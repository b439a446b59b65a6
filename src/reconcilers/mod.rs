// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Kubernetes reconciliation logic for `MySQLCluster` resources.
//!
//! # Modules
//!
//! - [`certificates`] - cert-manager `Certificate` lifecycle and secret ownership
//! - [`mysqlcluster`] - the per-instance reconcile that drives certificates
//! - [`retry`] - backoff and retryability of Kubernetes errors
//! - [`status`] - status condition helpers
//!
//! # Example: Wiring the Controller
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use kube::runtime::{watcher::Config, Controller};
//! use kube::Api;
//! use mysql_operator::context::Context;
//! use mysql_operator::crd::MySQLCluster;
//! use mysql_operator::reconcilers::{error_policy, reconcile_mysqlcluster};
//! use std::sync::Arc;
//!
//! async fn run(ctx: Arc<Context>) {
//!     let api = Api::<MySQLCluster>::all(ctx.client.clone());
//!     Controller::new(api, Config::default())
//!         .run(reconcile_mysqlcluster, error_policy, ctx)
//!         .for_each(|_| futures::future::ready(()))
//!         .await;
//! }
//! ```

pub mod certificates;
pub mod mysqlcluster;
pub mod retry;
pub mod status;

pub use mysqlcluster::{error_policy, reconcile_mysqlcluster};
