// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the MySQL operator.
//!
//! All metrics carry the namespace prefix `mysql_firestoned_io_`
//! (prometheus-safe version of "mysql.firestoned.io").
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - `MySQLCluster` reconciliation outcomes and durations
//! - **Certificate Metrics** - Created / patched / unchanged certificate outcomes
//! - **Role Label Metrics** - Role label mutations and work-queue retries
//!
//! # Example
//!
//! ```rust,no_run
//! use mysql_operator::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("MySQLCluster", std::time::Duration::from_secs(1));
//! ```

use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::net::SocketAddr;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::constants::METRICS_SERVER_PATH;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all operator metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "mysql_firestoned_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by resource type and status
///
/// Labels:
/// - `resource_type`: Kind of resource (e.g., `MySQLCluster`, `Pod`)
/// - `status`: Outcome (`success`, `error`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by resource type and status",
    );
    let counter = CounterVec::new(opts, &["resource_type", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `resource_type`: Kind of resource
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by resource type",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]);
    let histogram = HistogramVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Certificate Metrics
// ============================================================================

/// Certificate ensure outcomes
///
/// Labels:
/// - `purpose`: `server`, `client`, `exporter-client`
/// - `verb`: `created`, `patched`, `unchanged`
pub static CERTIFICATE_OUTCOMES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_certificate_outcomes_total"),
        "Certificate ensure outcomes by purpose and verb",
    );
    let counter = CounterVec::new(opts, &["purpose", "verb"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Role Label Metrics
// ============================================================================

/// Role label mutations applied to pods
///
/// Labels:
/// - `action`: `set`, `removed`
pub static ROLE_LABEL_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_role_label_changes_total"),
        "Role label mutations applied to pods by action",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Work-queue retry bookkeeping
///
/// Labels:
/// - `outcome`: `requeued`, `dropped`
pub static QUEUE_RETRIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_queue_retries_total"),
        "Work-queue keys requeued with backoff or dropped after exhausting retries",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Recording Functions
// ============================================================================

/// Record a successful reconciliation
pub fn record_reconciliation_success(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
pub fn record_reconciliation_error(resource_type: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[resource_type, "error"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[resource_type])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of one certificate ensure
pub fn record_certificate_outcome(purpose: &str, verb: &str) {
    CERTIFICATE_OUTCOMES_TOTAL
        .with_label_values(&[purpose, verb])
        .inc();
}

/// Record a role label mutation (`set` or `removed`)
pub fn record_role_label_change(action: &str) {
    ROLE_LABEL_CHANGES_TOTAL.with_label_values(&[action]).inc();
}

/// Record a key requeued with backoff
pub fn record_queue_requeue() {
    QUEUE_RETRIES_TOTAL.with_label_values(&["requeued"]).inc();
}

/// Record a key dropped after its retry budget was spent
pub fn record_queue_drop() {
    QUEUE_RETRIES_TOTAL.with_label_values(&["dropped"]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

/// `/metrics` handler
async fn metrics_handler() -> impl IntoResponse {
    match gather_metrics() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Router exposing the registry on [`METRICS_SERVER_PATH`]
pub fn metrics_router() -> Router {
    Router::new().route(METRICS_SERVER_PATH, get(metrics_handler))
}

/// Serve Prometheus metrics on `bind_address` until the task is dropped
///
/// # Errors
/// Returns error if the listener cannot be bound
pub async fn serve_metrics(bind_address: SocketAddr) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    info!(address = %bind_address, path = METRICS_SERVER_PATH, "Metrics server listening");
    axum::serve(listener, metrics_router()).await
}
