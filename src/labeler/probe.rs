// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Replication primary probe.
//!
//! Asks a single MySQL pod which group member is the write-primary. Election
//! happens inside MySQL group replication; the probe only reads the result.
//! Each call makes exactly one attempt. Retry policy belongs to the caller.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow};
use sqlx::{ConnectOptions, Connection, Row};
use std::time::Duration;
use tracing::debug;

use super::credentials::Credentials;
use crate::constants::{MYSQL_PROBE_DATABASE, PRIMARY_MEMBER_HOST_COLUMN, PRIMARY_MEMBER_QUERY};
use crate::errors::{within_deadline, OperatorError, Result};

/// Token of `host` before the first `.`.
///
/// `db-0-1.db-0-gvr.ns.svc` and `db-0-1` both yield `db-0-1`.
#[must_use]
pub fn short_host(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

/// Looks up the replication group's current primary through one of its pods.
#[async_trait]
pub trait PrimaryProbe: Send + Sync {
    /// Reported `MEMBER_HOST` of the primary, as seen from `pod`.
    ///
    /// # Errors
    ///
    /// Connection and query failures, and an empty result, are all errors.
    /// None of them mean "not primary".
    async fn primary_host(&self, pod: &Pod) -> Result<String>;

    /// Returns `true` if `pod` is the primary of its group.
    ///
    /// # Errors
    ///
    /// Propagates [`PrimaryProbe::primary_host`] errors.
    async fn is_primary(&self, pod: &Pod) -> Result<bool> {
        let host = self.primary_host(pod).await?;
        Ok(short_host(&host) == pod.name_any())
    }
}

/// [`PrimaryProbe`] that connects to the pod's own MySQL server with `sqlx`.
pub struct MySqlPrimaryProbe {
    credentials: Credentials,
    port: u16,
    timeout: Duration,
}

impl MySqlPrimaryProbe {
    #[must_use]
    pub fn new(credentials: Credentials, port: u16, timeout: Duration) -> Self {
        Self {
            credentials,
            port,
            timeout,
        }
    }

    fn connect_options(&self, host: &str) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(host)
            .port(self.port)
            .username(&self.credentials.username)
            .password(&self.credentials.password)
            .database(MYSQL_PROBE_DATABASE)
            .disable_statement_logging()
    }

    async fn query_primary(&self, host: &str, pod_name: &str) -> Result<String> {
        let mut conn: MySqlConnection = self.connect_options(host).connect().await?;
        let row: Option<MySqlRow> = sqlx::query(PRIMARY_MEMBER_QUERY)
            .fetch_optional(&mut conn)
            .await?;
        conn.close().await?;

        let row = row.ok_or_else(|| OperatorError::EmptyResult {
            pod: pod_name.to_string(),
        })?;
        let member_host: String = row.try_get(PRIMARY_MEMBER_HOST_COLUMN)?;
        if member_host.is_empty() {
            return Err(OperatorError::EmptyResult {
                pod: pod_name.to_string(),
            });
        }
        Ok(member_host)
    }
}

#[async_trait]
impl PrimaryProbe for MySqlPrimaryProbe {
    async fn primary_host(&self, pod: &Pod) -> Result<String> {
        let host = pod_endpoint(pod)?;
        let pod_name = pod.name_any();
        debug!(pod = %pod_name, host = %host, "Probing replication primary");

        within_deadline(
            self.timeout,
            "replication probe",
            self.query_primary(&host, &pod_name),
        )
        .await
    }
}

/// Network address of the pod's MySQL server.
///
/// Prefers the pod IP. Before the IP is assigned, a pod with a `subdomain`
/// is reachable as `<pod>.<subdomain>.<namespace>`.
///
/// # Errors
///
/// [`OperatorError::NotFound`] when the pod has neither.
pub fn pod_endpoint(pod: &Pod) -> Result<String> {
    if let Some(ip) = pod
        .status
        .as_ref()
        .and_then(|s| s.pod_ip.as_deref())
        .filter(|ip| !ip.is_empty())
    {
        return Ok(ip.to_string());
    }

    let name = pod.name_any();
    let namespace = pod.namespace().unwrap_or_default();
    match pod.spec.as_ref().and_then(|s| s.subdomain.as_deref()) {
        Some(subdomain) if !subdomain.is_empty() => Ok(format!("{name}.{subdomain}.{namespace}")),
        _ => Err(OperatorError::not_found("PodIP", namespace, name)),
    }
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod probe_tests;
