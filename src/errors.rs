// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the MySQL operator.
//!
//! Every failure the certificate manager, the replication probe, or the role
//! labeler can produce is an [`OperatorError`]. Each variant falls into one of
//! three classes (see [`ErrorClass`]):
//!
//! - **Configuration** - bad issuer kind, missing probe credential, unparseable
//!   override. Fatal and never retried.
//! - **`NotFound`** - issuer absent, secret not yet issued, object deleted
//!   mid-flight. Resolved by waiting for the next trigger.
//! - **Transient** - API server, certificate authority, or database
//!   connectivity, including API server rejections. Retried by the caller's
//!   retry policy.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = OperatorError> = std::result::Result<T, E>;

/// Errors raised while managing certificates or pod role labels.
#[derive(Error, Debug)]
pub enum OperatorError {
    /// Invalid operator or resource configuration
    ///
    /// Returned for an issuer kind other than `Issuer`/`ClusterIssuer`, a missing
    /// probe username, or a malformed certificate override.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A referenced object does not exist (yet)
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        /// Kind of the missing object (e.g., `Secret`, `ClusterIssuer`)
        kind: String,
        /// Namespace searched; empty for cluster-scoped kinds
        namespace: String,
        /// Name of the missing object
        name: String,
    },

    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// MySQL connection or query failure
    #[error("MySQL error: {0}")]
    Database(#[from] sqlx::Error),

    /// The replication introspection query returned no primary member
    #[error("replication group reported no primary member for pod {pod}")]
    EmptyResult {
        /// Pod whose endpoint was queried
        pod: String,
    },

    /// A network call exceeded its deadline
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        /// Human-readable name of the operation
        operation: String,
        /// Deadline that was exceeded, in milliseconds
        timeout_ms: u64,
    },

    /// A desired object could not be serialized into a patch body
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification driving retry decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fatal; surfaced immediately, never retried
    Configuration,
    /// Not ready yet; wait for the next trigger
    NotFound,
    /// Connectivity or server-side failure; retry with backoff
    Transient,
}

impl OperatorError {
    /// Build a [`OperatorError::NotFound`] for the given object.
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        OperatorError::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Classify this error.
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            OperatorError::Configuration(_) => ErrorClass::Configuration,
            OperatorError::NotFound { .. } => ErrorClass::NotFound,
            OperatorError::Kube(kube::Error::Api(resp)) if resp.code == 404 => {
                ErrorClass::NotFound
            }
            OperatorError::Kube(_)
            | OperatorError::Database(_)
            | OperatorError::EmptyResult { .. }
            | OperatorError::Timeout { .. }
            | OperatorError::Serialization(_) => ErrorClass::Transient,
        }
    }

    /// Returns `false` for errors that no amount of retrying can fix.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() != ErrorClass::Configuration
    }
}

/// Run `operation` under a deadline, mapping expiry to [`OperatorError::Timeout`].
///
/// Dropping the returned future cancels the underlying call.
///
/// # Errors
///
/// Returns the operation's own error, or `Timeout` once `deadline` elapses.
pub async fn within_deadline<T, F>(deadline: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(OperatorError::Timeout {
            operation: operation.to_string(),
            timeout_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
