// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the MySQL operator.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// API Constants
// ============================================================================

/// Kind name for `MySQLCluster` resource
pub const KIND_MYSQL_CLUSTER: &str = "MySQLCluster";

/// Field manager recorded on every write made by the operator
pub const FIELD_MANAGER: &str = "mysql-operator";

// ============================================================================
// cert-manager Constants
// ============================================================================

/// API group of cert-manager resources
pub const CERT_MANAGER_GROUP: &str = "cert-manager.io";

/// Namespace-scoped issuer kind
pub const ISSUER_KIND: &str = "Issuer";

/// Cluster-scoped issuer kind
pub const CLUSTER_ISSUER_KIND: &str = "ClusterIssuer";

/// Suffix for the server certificate and its secret
pub const SERVER_CERT_SUFFIX: &str = "server";

/// Suffix for the client certificate and its secret
pub const CLIENT_CERT_SUFFIX: &str = "client";

/// Suffix for the metrics exporter client certificate and its secret
pub const EXPORTER_CLIENT_CERT_SUFFIX: &str = "exporter-client";

/// Organization always present on server certificates
pub const SERVER_CERT_ORGANIZATION: &str = "mysql.firestoned.io:server";

/// DNS name always present on every certificate
pub const LOCALHOST_DNS_NAME: &str = "localhost";

/// IP address always present on every certificate
pub const LOCALHOST_IP_ADDRESS: &str = "127.0.0.1";

// ============================================================================
// MySQL Constants
// ============================================================================

/// Default MySQL client port
pub const MYSQL_PORT: u16 = 3306;

/// Database the replication probe connects to
pub const MYSQL_PROBE_DATABASE: &str = "mysql";

/// Environment variable holding the probe username
pub const ENV_MYSQL_USERNAME: &str = "username";

/// Environment variable holding the probe password
pub const ENV_MYSQL_PASSWORD: &str = "password";

/// Replication introspection query returning the current primary member host
pub const PRIMARY_MEMBER_QUERY: &str = "SELECT MEMBER_HOST FROM performance_schema.replication_group_members \
     INNER JOIN performance_schema.global_status ON (MEMBER_ID = VARIABLE_VALUE) \
     WHERE VARIABLE_NAME='group_replication_primary_member'";

/// Column returned by [`PRIMARY_MEMBER_QUERY`]
pub const PRIMARY_MEMBER_HOST_COLUMN: &str = "MEMBER_HOST";

// ============================================================================
// Controller Timing Constants
// ============================================================================

/// Default deadline for a single Kubernetes API round trip during certificate management
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Requeue interval once all certificate secrets are present (5 minutes)
pub const REQUEUE_READY_SECS: u64 = 300;

/// Requeue interval while certificate secrets are still being issued
pub const REQUEUE_PENDING_SECS: u64 = 30;

/// Requeue duration for controller errors (30 seconds)
pub const ERROR_REQUEUE_DURATION_SECS: u64 = 30;

// ============================================================================
// Role Labeler Constants
// ============================================================================

/// Default number of labeler worker tasks
pub const DEFAULT_LABELER_WORKERS: usize = 2;

/// Default retry budget per pod key before it is dropped
pub const DEFAULT_MAX_REQUEUES: u32 = 5;

/// Default deadline for a single replication probe
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 10;

/// Base delay of the per-key work queue backoff
pub const QUEUE_BACKOFF_BASE_MILLIS: u64 = 5;

/// Maximum delay of the per-key work queue backoff
pub const QUEUE_BACKOFF_MAX_SECS: u64 = 1000;

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default listen address of the Prometheus metrics HTTP server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
