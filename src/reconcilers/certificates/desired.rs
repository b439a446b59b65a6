// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state builders for the three `MySQLCluster` certificates.
//!
//! Everything here is pure: given a cluster, its TLS configuration and the
//! live load-balancer addresses of its service, build the exact `Certificate`
//! the operator wants to exist, and decide whether an existing one matches it.

use k8s_openapi::api::core::v1::Service;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};

use super::owners::has_owner;
use super::{certificate_name, service_dns_name, CertificatePurpose, IssuerKind};
use crate::cert_manager::{CertIssuerRef, Certificate, CertificateSpec, X509Subject};
use crate::constants::{
    CERT_MANAGER_GROUP, KIND_MYSQL_CLUSTER, LOCALHOST_DNS_NAME, LOCALHOST_IP_ADDRESS,
    SERVER_CERT_ORGANIZATION,
};
use crate::crd::{MySQLCluster, TlsConfig};
use crate::duration::{durations_equal, parse_go_duration};
use crate::errors::{OperatorError, Result};

/// Subject alternative names taken from a service's live load-balancer ingress.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngressHosts {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<String>,
}

impl IngressHosts {
    /// Collect load-balancer hostnames and IPs from `service`.
    ///
    /// An ingress entry with a hostname contributes only the hostname; its IP
    /// is used only when no hostname is set.
    #[must_use]
    pub fn from_service(service: &Service) -> Self {
        let mut hosts = IngressHosts::default();
        let ingress = service
            .status
            .as_ref()
            .and_then(|s| s.load_balancer.as_ref())
            .and_then(|lb| lb.ingress.as_ref());

        for item in ingress.into_iter().flatten() {
            match (item.hostname.as_deref(), item.ip.as_deref()) {
                (Some(hostname), _) if !hostname.is_empty() => {
                    hosts.dns_names.push(hostname.to_string());
                }
                (_, Some(ip)) if !ip.is_empty() => hosts.ip_addresses.push(ip.to_string()),
                _ => {}
            }
        }
        hosts
    }
}

/// Build the desired `Certificate` for `purpose`.
///
/// `ingress` is only consulted for [`CertificatePurpose::Server`].
///
/// # Errors
///
/// Returns [`OperatorError::Configuration`] if the issuer kind is not
/// `Issuer`/`ClusterIssuer`, an override duration does not parse, or the
/// cluster has not been persisted yet (no uid to own the certificate).
pub fn desired_certificate(
    cluster: &MySQLCluster,
    tls: &TlsConfig,
    purpose: CertificatePurpose,
    ingress: &IngressHosts,
) -> Result<Certificate> {
    let issuer_kind = IssuerKind::parse(&tls.issuer_ref.kind)?;
    let name = cluster.name_any();
    let namespace = cluster.namespace().unwrap_or_default();
    let service_url = service_dns_name(&name, &namespace);
    let overrides = tls.certificate.clone().unwrap_or_default();

    for value in [&overrides.duration, &overrides.renew_before]
        .into_iter()
        .flatten()
    {
        parse_go_duration(value)?;
    }

    let mut dns_names = vec![service_url.clone(), LOCALHOST_DNS_NAME.to_string()];
    let mut ip_addresses = vec![LOCALHOST_IP_ADDRESS.to_string()];
    if purpose == CertificatePurpose::Server {
        dns_names.extend(ingress.dns_names.iter().cloned());
        ip_addresses.extend(ingress.ip_addresses.iter().cloned());
    }
    dns_names.extend(overrides.dns_names);
    ip_addresses.extend(overrides.ip_addresses);

    let mut organizations = overrides.organization;
    if purpose == CertificatePurpose::Server {
        organizations.push(SERVER_CERT_ORGANIZATION.to_string());
    }
    let organizations = dedup_preserving_order(organizations);

    let owner = cluster.controller_owner_ref(&()).ok_or_else(|| {
        OperatorError::Configuration(format!(
            "{KIND_MYSQL_CLUSTER} {namespace}/{name} has no uid; cannot own certificates"
        ))
    })?;

    let cert_name = certificate_name(&name, purpose);
    Ok(Certificate {
        metadata: ObjectMeta {
            name: Some(cert_name.clone()),
            namespace: Some(namespace),
            labels: Some(cluster.labels().clone()),
            owner_references: Some(vec![owner]),
            ..Default::default()
        },
        spec: CertificateSpec {
            common_name: service_url,
            subject: (!organizations.is_empty()).then(|| X509Subject { organizations }),
            duration: overrides.duration,
            renew_before: overrides.renew_before,
            dns_names: dedup_preserving_order(dns_names),
            ip_addresses: dedup_preserving_order(ip_addresses),
            uris: dedup_preserving_order(overrides.uri_sans),
            secret_name: cert_name,
            issuer_ref: CertIssuerRef {
                name: tls.issuer_ref.name.clone(),
                kind: issuer_kind.as_str().to_string(),
                group: Some(
                    tls.issuer_ref
                        .api_group
                        .clone()
                        .unwrap_or_else(|| CERT_MANAGER_GROUP.to_string()),
                ),
            },
            is_ca: false,
            usages: purpose.usages().to_vec(),
        },
    })
}

/// Returns `true` if `existing` already matches `desired`.
///
/// Durations compare by value, labels must be a superset of the desired labels,
/// and every desired owner must already be referenced with the same uid.
#[must_use]
pub fn matches_desired(existing: &Certificate, desired: &Certificate) -> bool {
    let labels_match = desired
        .labels()
        .iter()
        .all(|(k, v)| existing.labels().get(k) == Some(v));

    let owners_match = desired
        .owner_references()
        .iter()
        .all(|owner| has_owner(existing.owner_references(), owner));

    labels_match && owners_match && specs_equivalent(&existing.spec, &desired.spec)
}

/// Merge `desired` onto `existing`, keeping the existing object's identity.
///
/// The result carries the existing name, uid and `resourceVersion` so the write
/// is conditioned on the version that was compared.
#[must_use]
pub fn merged_certificate(existing: &Certificate, desired: &Certificate) -> Certificate {
    let mut merged = existing.clone();
    merged.spec = desired.spec.clone();

    let labels = merged.metadata.labels.get_or_insert_with(Default::default);
    for (k, v) in desired.labels() {
        labels.insert(k.clone(), v.clone());
    }

    let owners = merged
        .metadata
        .owner_references
        .get_or_insert_with(Vec::new);
    for owner in desired.owner_references() {
        super::owners::ensure_owner_reference(owners, owner.clone());
    }
    merged
}

fn specs_equivalent(a: &CertificateSpec, b: &CertificateSpec) -> bool {
    a.common_name == b.common_name
        && a.subject.clone().unwrap_or_default() == b.subject.clone().unwrap_or_default()
        && durations_equal(a.duration.as_deref(), b.duration.as_deref())
        && durations_equal(a.renew_before.as_deref(), b.renew_before.as_deref())
        && a.dns_names == b.dns_names
        && a.ip_addresses == b.ip_addresses
        && a.uris == b.uris
        && a.secret_name == b.secret_name
        && a.issuer_ref == b.issuer_ref
        && a.is_ca == b.is_ca
        && a.usages == b.usages
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    values
        .into_iter()
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

#[cfg(test)]
#[path = "desired_tests.rs"]
mod desired_tests;
