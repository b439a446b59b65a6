// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Custom Resource Definitions (CRDs) for MySQL management.
//!
//! # Resource Types
//!
//! - [`MySQLCluster`] - A MySQL group replication cluster, optionally serving TLS
//!
//! # Example: Declaring a TLS-enabled cluster
//!
//! ```rust,no_run
//! use mysql_operator::crd::{IssuerReference, MySQLClusterSpec, TlsConfig};
//!
//! let spec = MySQLClusterSpec {
//!     replicas: Some(3),
//!     version: Some("8.0.35".to_string()),
//!     tls: Some(TlsConfig {
//!         issuer_ref: IssuerReference {
//!             name: "ca-issuer".to_string(),
//!             kind: "ClusterIssuer".to_string(),
//!             api_group: None,
//!         },
//!         certificate: None,
//!     }),
//! };
//! ```

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to the cert-manager issuer that signs the cluster's certificates.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct IssuerReference {
    /// Name of the `Issuer` or `ClusterIssuer`.
    pub name: String,

    /// Either `Issuer` (namespace-scoped) or `ClusterIssuer` (cluster-scoped).
    ///
    /// Any other value is rejected before a certificate is written.
    pub kind: String,

    /// API group of the issuer. Defaults to `cert-manager.io`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_group: Option<String>,
}

/// Operator-supplied additions to the generated certificates.
///
/// Every list is additive: the operator's defaults (service DNS name,
/// `localhost`, `127.0.0.1`) are always present.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CertificateOverrides {
    /// Extra DNS subject alternative names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,

    /// Extra IP address subject alternative names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_addresses: Vec<String>,

    /// URI subject alternative names.
    #[serde(default, rename = "uriSANs", skip_serializing_if = "Vec::is_empty")]
    pub uri_sans: Vec<String>,

    /// Organizations for the certificate subject.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub organization: Vec<String>,

    /// Requested certificate lifetime as a Go duration (e.g., `2160h`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,

    /// How long before expiry cert-manager renews, as a Go duration (e.g., `360h`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub renew_before: Option<String>,
}

/// TLS configuration for a `MySQLCluster`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Issuer used for the server, client and exporter client certificates.
    pub issuer_ref: IssuerReference,

    /// Optional certificate overrides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateOverrides>,
}

/// Condition represents an observation of a resource's current state.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition (e.g., `CertificatesReady`).
    pub r#type: String,

    /// Status of the condition: True, False, or Unknown.
    pub status: String,

    /// Brief CamelCase reason for the condition's last transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message indicating details about the transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Last time the condition transitioned from one status to another (RFC3339 format).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
}

/// `MySQLCluster` represents one MySQL group replication cluster.
///
/// The operator issues TLS material for it through cert-manager and keeps the
/// `role` label on its pods pointed at the current write-primary.
///
/// # Example
///
/// ```yaml
/// apiVersion: mysql.firestoned.io/v1alpha1
/// kind: MySQLCluster
/// metadata:
///   name: db-0
///   namespace: ns
/// spec:
///   replicas: 3
///   tls:
///     issuerRef:
///       name: ca-issuer
///       kind: ClusterIssuer
/// ```
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, PartialEq, JsonSchema)]
#[kube(
    group = "mysql.firestoned.io",
    version = "v1alpha1",
    kind = "MySQLCluster",
    namespaced,
    shortname = "mysqlc",
    doc = "MySQLCluster represents a MySQL group replication cluster. The operator provisions its TLS certificates through cert-manager and labels the current primary pod."
)]
#[kube(status = "MySQLClusterStatus")]
#[kube(printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#)]
#[serde(rename_all = "camelCase")]
pub struct MySQLClusterSpec {
    /// Number of group members.
    #[serde(default)]
    #[schemars(range(min = 1, max = 9))]
    pub replicas: Option<i32>,

    /// MySQL server version.
    #[serde(default)]
    pub version: Option<String>,

    /// TLS configuration. When absent the cluster serves plaintext and no
    /// certificates are managed.
    #[serde(default)]
    pub tls: Option<TlsConfig>,
}

/// `MySQLCluster` status
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MySQLClusterStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

#[cfg(test)]
#[path = "crd_tests.rs"]
mod crd_tests;
