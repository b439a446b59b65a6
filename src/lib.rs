// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # mysql-operator - MySQL Operator Core for Kubernetes
//!
//! The TLS and topology-labeling core of a Kubernetes operator for MySQL group
//! replication clusters.
//!
//! ## Overview
//!
//! Two independent control loops:
//!
//! - **Certificate lifecycle** - for every `MySQLCluster` with TLS configured,
//!   keeps cert-manager `Certificate` objects for the server, client, and
//!   metrics exporter client in line with the desired spec, and attaches owner
//!   references to the issued secrets so they are garbage-collected with the cluster.
//! - **Role labeling** - a watch-driven worker pool that asks each MySQL pod
//!   who the replication primary is, and sets or removes the
//!   `mysql.firestoned.io/role=primary` label accordingly.
//!
//! ## Modules
//!
//! - [`crd`] - `MySQLCluster` custom resource types
//! - [`cert_manager`] - typed cert-manager `Certificate`, `Issuer` and `ClusterIssuer`
//! - [`reconcilers`] - certificate management and the `MySQLCluster` reconcile
//! - [`labeler`] - work queue, replication probe and role label controller
//! - [`context`] - shared controller context
//! - [`errors`] - error taxonomy and retry classification
//! - [`events`] - Kubernetes Event publishing
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_operator::reconcilers::certificates::{certificate_name, CertificatePurpose};
//!
//! assert_eq!(certificate_name("db-0", CertificatePurpose::Server), "db-0-server");
//! ```

pub mod cert_manager;
pub mod constants;
pub mod context;
pub mod crd;
pub mod duration;
pub mod errors;
pub mod events;
pub mod labeler;
pub mod labels;
pub mod metrics;
pub mod reconcilers;
