// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TLS certificate lifecycle for `MySQLCluster` resources.
//!
//! For a TLS-enabled cluster the operator keeps three cert-manager
//! `Certificate` requests in their desired shape:
//!
//! - `<name>-server` - server auth, SANs include the service's load-balancer ingress
//! - `<name>-client` - client auth
//! - `<name>-exporter-client` - client auth for the metrics exporter
//!
//! Once cert-manager has materialised a secret, the secret is given owner
//! references to both its `Certificate` and the cluster.
//!
//! The manager performs no retries. Every error is returned to the caller,
//! which re-runs the whole pass on its own schedule.

pub mod desired;
pub mod owners;
pub mod store;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::runtime::events::EventType;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use self::desired::{desired_certificate, matches_desired, merged_certificate, IngressHosts};
use self::owners::ensure_owner_reference;
use self::store::CertificateStore;
use crate::cert_manager::{Certificate, KeyUsage};
use crate::constants::{
    CLIENT_CERT_SUFFIX, CLUSTER_ISSUER_KIND, EXPORTER_CLIENT_CERT_SUFFIX, ISSUER_KIND,
    SERVER_CERT_SUFFIX,
};
use crate::crd::{MySQLCluster, TlsConfig};
use crate::errors::{within_deadline, OperatorError, Result};
use crate::events::{actions, reasons, EventPublisher};
use crate::metrics;

/// Which of the three cluster certificates is being managed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CertificatePurpose {
    Server,
    Client,
    ExporterClient,
}

impl CertificatePurpose {
    /// All purposes, in the order they are ensured and checked.
    #[must_use]
    pub const fn all() -> [CertificatePurpose; 3] {
        [
            CertificatePurpose::Server,
            CertificatePurpose::Client,
            CertificatePurpose::ExporterClient,
        ]
    }

    /// Name suffix shared by the `Certificate` and its secret.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            CertificatePurpose::Server => SERVER_CERT_SUFFIX,
            CertificatePurpose::Client => CLIENT_CERT_SUFFIX,
            CertificatePurpose::ExporterClient => EXPORTER_CLIENT_CERT_SUFFIX,
        }
    }

    /// Fixed key usages for this purpose. Overrides never change them.
    #[must_use]
    pub const fn usages(self) -> &'static [KeyUsage] {
        match self {
            CertificatePurpose::Server => &[
                KeyUsage::DigitalSignature,
                KeyUsage::KeyEncipherment,
                KeyUsage::ServerAuth,
            ],
            CertificatePurpose::Client | CertificatePurpose::ExporterClient => &[
                KeyUsage::DigitalSignature,
                KeyUsage::KeyEncipherment,
                KeyUsage::ClientAuth,
            ],
        }
    }

    /// Human-readable label used in events.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            CertificatePurpose::Server => "server",
            CertificatePurpose::Client => "client",
            CertificatePurpose::ExporterClient => "exporter client",
        }
    }
}

impl fmt::Display for CertificatePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Outcome of one ensure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CertificateVerb {
    Created,
    Patched,
    Unchanged,
}

impl CertificateVerb {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CertificateVerb::Created => "created",
            CertificateVerb::Patched => "patched",
            CertificateVerb::Unchanged => "unchanged",
        }
    }
}

/// The two issuer scopes cert-manager supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IssuerKind {
    /// Namespace-scoped `Issuer`
    Issuer,
    /// Cluster-scoped `ClusterIssuer`
    ClusterIssuer,
}

impl IssuerKind {
    /// Parse an issuer reference kind. Matching is exact and case-sensitive.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::Configuration`] for any other value.
    pub fn parse(kind: &str) -> Result<Self> {
        match kind {
            ISSUER_KIND => Ok(IssuerKind::Issuer),
            CLUSTER_ISSUER_KIND => Ok(IssuerKind::ClusterIssuer),
            other => Err(OperatorError::Configuration(format!(
                "issuerRef.kind '{other}' is neither {ISSUER_KIND} nor {CLUSTER_ISSUER_KIND}"
            ))),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            IssuerKind::Issuer => ISSUER_KIND,
            IssuerKind::ClusterIssuer => CLUSTER_ISSUER_KIND,
        }
    }
}

/// `<instance>-<suffix>`, the name of both the `Certificate` and its secret.
#[must_use]
pub fn certificate_name(instance: &str, purpose: CertificatePurpose) -> String {
    format!("{instance}-{}", purpose.suffix())
}

/// `<instance>.<namespace>.svc`, the cluster service's DNS name.
#[must_use]
pub fn service_dns_name(instance: &str, namespace: &str) -> String {
    format!("{instance}.{namespace}.svc")
}

/// Ensures the certificates of `MySQLCluster` resources.
///
/// Store and event handles are injected so tests can substitute fakes.
pub struct CertificateManager {
    store: Arc<dyn CertificateStore>,
    events: Arc<dyn EventPublisher>,
    request_timeout: Duration,
}

impl CertificateManager {
    #[must_use]
    pub fn new(
        store: Arc<dyn CertificateStore>,
        events: Arc<dyn EventPublisher>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            events,
            request_timeout,
        }
    }

    /// Ensure all three certificates for `cluster`.
    ///
    /// Order: validate the issuer kind, confirm the issuer exists, then ensure
    /// Server, Client and `ExporterClient`. The first error aborts the pass.
    ///
    /// # Errors
    ///
    /// - [`OperatorError::Configuration`] if TLS is not configured or the
    ///   issuer kind is invalid (before any write)
    /// - [`OperatorError::NotFound`] if the issuer or the cluster's service is absent
    /// - any store error, unmodified
    pub async fn manage_tls(&self, cluster: &MySQLCluster) -> Result<()> {
        let tls = tls_config(cluster)?;
        let namespace = cluster.namespace().unwrap_or_default();
        self.validate_issuer(&namespace, tls).await?;

        for purpose in CertificatePurpose::all() {
            self.ensure_certificate(cluster, tls, purpose).await?;
        }
        Ok(())
    }

    /// Check that the issuer referenced by `tls` is valid and exists.
    ///
    /// # Errors
    ///
    /// [`OperatorError::Configuration`] for a bad kind,
    /// [`OperatorError::NotFound`] if the issuer does not exist.
    pub async fn validate_issuer(&self, namespace: &str, tls: &TlsConfig) -> Result<()> {
        let kind = IssuerKind::parse(&tls.issuer_ref.kind)?;
        let name = tls.issuer_ref.name.as_str();

        let exists = within_deadline(
            self.request_timeout,
            "issuer lookup",
            self.store.issuer_exists(kind, namespace, name),
        )
        .await?;

        if !exists {
            let scope = match kind {
                IssuerKind::Issuer => namespace,
                IssuerKind::ClusterIssuer => "",
            };
            return Err(OperatorError::not_found(kind.as_str(), scope, name));
        }
        Ok(())
    }

    /// Create, patch, or leave alone the certificate for `purpose`.
    ///
    /// Emits one `Successful` event when the certificate was created or
    /// patched. If the issued secret already exists, owner references to the
    /// certificate and the cluster are attached to it.
    ///
    /// # Errors
    ///
    /// Returns configuration, lookup and store errors unmodified. A missing
    /// secret is not an error.
    pub async fn ensure_certificate(
        &self,
        cluster: &MySQLCluster,
        tls: &TlsConfig,
        purpose: CertificatePurpose,
    ) -> Result<CertificateVerb> {
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_default();

        let ingress = if purpose == CertificatePurpose::Server {
            let service = within_deadline(
                self.request_timeout,
                "service lookup",
                self.store.get_service(&namespace, &name),
            )
            .await?
            .ok_or_else(|| OperatorError::not_found("Service", &namespace, &name))?;
            IngressHosts::from_service(&service)
        } else {
            IngressHosts::default()
        };

        let desired = desired_certificate(cluster, tls, purpose, &ingress)?;
        let cert_name = desired.name_any();

        let existing = within_deadline(
            self.request_timeout,
            "certificate lookup",
            self.store.get_certificate(&namespace, &cert_name),
        )
        .await?;

        let (verb, certificate) = match existing {
            None => {
                let created = within_deadline(
                    self.request_timeout,
                    "certificate create",
                    self.store.create_certificate(&desired),
                )
                .await?;
                (CertificateVerb::Created, created)
            }
            Some(existing) if matches_desired(&existing, &desired) => {
                (CertificateVerb::Unchanged, existing)
            }
            Some(existing) => {
                let merged = merged_certificate(&existing, &desired);
                let patched = within_deadline(
                    self.request_timeout,
                    "certificate patch",
                    self.store.patch_certificate(&merged),
                )
                .await?;
                (CertificateVerb::Patched, patched)
            }
        };

        metrics::record_certificate_outcome(purpose.suffix(), verb.as_str());
        if verb == CertificateVerb::Unchanged {
            debug!(certificate = %cert_name, namespace = %namespace, "Certificate unchanged");
        } else {
            info!(
                certificate = %cert_name,
                namespace = %namespace,
                verb = verb.as_str(),
                "Certificate {}", verb.as_str()
            );
            self.events
                .publish(
                    &cluster.object_ref(&()),
                    EventType::Normal,
                    reasons::SUCCESSFUL,
                    actions::ENSURE_CERTIFICATE,
                    Some(format!(
                        "Successfully {} MySQL {} certificates",
                        verb.as_str(),
                        purpose.description()
                    )),
                )
                .await;
        }

        self.attach_secret_owners(cluster, &certificate).await?;
        Ok(verb)
    }

    /// Confirm that the Server, Client and `ExporterClient` secrets exist.
    ///
    /// # Errors
    ///
    /// [`OperatorError::NotFound`] naming the first missing secret, or any
    /// store error.
    pub async fn check_certificates_ready(&self, cluster: &MySQLCluster) -> Result<()> {
        let name = cluster.name_any();
        let namespace = cluster.namespace().unwrap_or_default();

        for purpose in CertificatePurpose::all() {
            let secret_name = certificate_name(&name, purpose);
            let found = within_deadline(
                self.request_timeout,
                "secret lookup",
                self.store.get_secret_metadata(&namespace, &secret_name),
            )
            .await?;
            if found.is_none() {
                return Err(OperatorError::not_found("Secret", &namespace, secret_name));
            }
        }
        Ok(())
    }

    /// Add owner references to the certificate's secret once it exists.
    async fn attach_secret_owners(
        &self,
        cluster: &MySQLCluster,
        certificate: &Certificate,
    ) -> Result<()> {
        let namespace = cluster.namespace().unwrap_or_default();
        let secret_name = certificate.spec.secret_name.clone();

        let Some(meta) = within_deadline(
            self.request_timeout,
            "secret lookup",
            self.store.get_secret_metadata(&namespace, &secret_name),
        )
        .await?
        else {
            debug!(secret = %secret_name, namespace = %namespace, "Secret not issued yet; deferring ownership");
            return Ok(());
        };

        let certificate_owner = certificate_owner_ref(certificate)?;
        let cluster_owner = cluster.controller_owner_ref(&()).ok_or_else(|| {
            OperatorError::Configuration(format!(
                "cluster {namespace}/{} has no uid",
                cluster.name_any()
            ))
        })?;

        let mut owners = meta.owner_references.clone().unwrap_or_default();
        let mut changed = ensure_owner_reference(&mut owners, certificate_owner);
        changed |= ensure_owner_reference(&mut owners, cluster_owner);
        if !changed {
            return Ok(());
        }

        within_deadline(
            self.request_timeout,
            "secret owner patch",
            self.store.patch_secret_owners(
                &namespace,
                &secret_name,
                &owners,
                meta.resource_version.as_deref(),
            ),
        )
        .await?;
        info!(secret = %secret_name, namespace = %namespace, "Attached owner references to secret");
        Ok(())
    }
}

fn tls_config(cluster: &MySQLCluster) -> Result<&TlsConfig> {
    cluster.spec.tls.as_ref().ok_or_else(|| {
        OperatorError::Configuration(format!(
            "MySQLCluster {}/{} does not configure TLS",
            cluster.namespace().unwrap_or_default(),
            cluster.name_any()
        ))
    })
}

/// Non-controller reference to a persisted `Certificate`.
fn certificate_owner_ref(certificate: &Certificate) -> Result<OwnerReference> {
    let mut reference = certificate.owner_ref(&()).ok_or_else(|| {
        OperatorError::Configuration(format!(
            "Certificate {} has no uid",
            certificate.name_any()
        ))
    })?;
    reference.controller = Some(false);
    reference.block_owner_deletion = Some(true);
    Ok(reference)
}
