// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Backing-store access for the certificate manager.
//!
//! [`CertificateStore`] is the seam between certificate management and the
//! Kubernetes API. [`KubeCertificateStore`] is the production implementation;
//! tests substitute an in-memory store that counts writes.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Secret, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{ObjectMeta, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use tracing::debug;

use super::IssuerKind;
use crate::cert_manager::{Certificate, ClusterIssuer, Issuer};
use crate::constants::FIELD_MANAGER;
use crate::errors::{OperatorError, Result};

/// Reads and writes the objects certificate management depends on.
///
/// Writes are conditioned on the object's `resourceVersion` when one is
/// supplied; conflicts surface as transient API errors.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Returns `true` if the referenced issuer exists.
    async fn issuer_exists(&self, kind: IssuerKind, namespace: &str, name: &str) -> Result<bool>;

    /// Fetch a `Service`, or `None` if it does not exist.
    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>>;

    /// Fetch a `Certificate`, or `None` if it does not exist.
    async fn get_certificate(&self, namespace: &str, name: &str) -> Result<Option<Certificate>>;

    /// Create a new `Certificate`.
    async fn create_certificate(&self, certificate: &Certificate) -> Result<Certificate>;

    /// Update an existing `Certificate` in place.
    ///
    /// `certificate` is the full merged object, carrying the identity and
    /// `resourceVersion` of the version it was derived from.
    async fn patch_certificate(&self, certificate: &Certificate) -> Result<Certificate>;

    /// Fetch only the metadata of a `Secret`, or `None` if it does not exist.
    async fn get_secret_metadata(&self, namespace: &str, name: &str)
        -> Result<Option<ObjectMeta>>;

    /// Replace a secret's owner references, conditioned on `resource_version`.
    async fn patch_secret_owners(
        &self,
        namespace: &str,
        name: &str,
        owners: &[OwnerReference],
        resource_version: Option<&str>,
    ) -> Result<()>;
}

/// [`CertificateStore`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeCertificateStore {
    client: Client,
}

impl KubeCertificateStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CertificateStore for KubeCertificateStore {
    async fn issuer_exists(&self, kind: IssuerKind, namespace: &str, name: &str) -> Result<bool> {
        let found = match kind {
            IssuerKind::Issuer => Api::<Issuer>::namespaced(self.client.clone(), namespace)
                .get_metadata_opt(name)
                .await?
                .is_some(),
            IssuerKind::ClusterIssuer => Api::<ClusterIssuer>::all(self.client.clone())
                .get_metadata_opt(name)
                .await?
                .is_some(),
        };
        Ok(found)
    }

    async fn get_service(&self, namespace: &str, name: &str) -> Result<Option<Service>> {
        Ok(Api::<Service>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await?)
    }

    async fn get_certificate(&self, namespace: &str, name: &str) -> Result<Option<Certificate>> {
        Ok(Api::<Certificate>::namespaced(self.client.clone(), namespace)
            .get_opt(name)
            .await?)
    }

    async fn create_certificate(&self, certificate: &Certificate) -> Result<Certificate> {
        let namespace = certificate.namespace().unwrap_or_default();
        let params = PostParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PostParams::default()
        };
        Ok(Api::<Certificate>::namespaced(self.client.clone(), &namespace)
            .create(&params, certificate)
            .await?)
    }

    async fn patch_certificate(&self, certificate: &Certificate) -> Result<Certificate> {
        let namespace = certificate.namespace().unwrap_or_default();
        let name = certificate.name_any();
        let body = certificate_merge_patch(certificate)?;
        debug!(certificate = %name, namespace = %namespace, "Patching Certificate");

        Ok(Api::<Certificate>::namespaced(self.client.clone(), &namespace)
            .patch(&name, &merge_params(), &Patch::Merge(&body))
            .await?)
    }

    async fn get_secret_metadata(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ObjectMeta>> {
        Ok(Api::<Secret>::namespaced(self.client.clone(), namespace)
            .get_metadata_opt(name)
            .await?
            .map(|partial| partial.metadata))
    }

    async fn patch_secret_owners(
        &self,
        namespace: &str,
        name: &str,
        owners: &[OwnerReference],
        resource_version: Option<&str>,
    ) -> Result<()> {
        let body = json!({
            "metadata": {
                "ownerReferences": owners,
                "resourceVersion": resource_version,
            }
        });
        Api::<Secret>::namespaced(self.client.clone(), namespace)
            .patch(name, &merge_params(), &Patch::Merge(&body))
            .await?;
        Ok(())
    }
}

fn merge_params() -> PatchParams {
    PatchParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..PatchParams::default()
    }
}

/// Optional spec keys the operator owns; absent means "clear it".
const OWNED_OPTIONAL_SPEC_KEYS: [&str; 7] = [
    "subject",
    "duration",
    "renewBefore",
    "dnsNames",
    "ipAddresses",
    "uris",
    "usages",
];

/// Build a JSON merge patch that makes the stored certificate match `certificate`.
///
/// Optional spec fields the operator owns are sent as `null` when unset so a
/// removed override is actually removed, while fields the operator does not
/// model are left alone.
///
/// # Errors
///
/// Returns [`OperatorError::Serialization`] if the spec cannot be serialized.
pub fn certificate_merge_patch(certificate: &Certificate) -> Result<Value> {
    let mut spec = serde_json::to_value(&certificate.spec)?;
    if let Value::Object(map) = &mut spec {
        for key in OWNED_OPTIONAL_SPEC_KEYS {
            map.entry(key.to_string()).or_insert(Value::Null);
        }
    } else {
        return Err(OperatorError::Configuration(
            "certificate spec did not serialize to an object".to_string(),
        ));
    }

    Ok(json!({
        "metadata": {
            "labels": certificate.metadata.labels,
            "ownerReferences": certificate.metadata.owner_references,
            "resourceVersion": certificate.metadata.resource_version,
        },
        "spec": spec,
    }))
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
