// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Role label mutations on pods.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::constants::FIELD_MANAGER;
use crate::errors::Result;
use crate::labels::{is_labeled_primary, ROLE_LABEL, ROLE_PRIMARY};

/// A change to a pod's role label.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoleChange {
    /// Set the role label to `primary`
    SetPrimary,
    /// Remove the role label
    Remove,
}

impl RoleChange {
    /// The change needed to bring `labels` in line with the probe result, if any.
    #[must_use]
    pub fn for_labels(labels: &BTreeMap<String, String>, is_primary: bool) -> Option<Self> {
        match (is_primary, is_labeled_primary(labels), labels.contains_key(ROLE_LABEL)) {
            (true, true, _) | (false, _, false) => None,
            (true, false, _) => Some(RoleChange::SetPrimary),
            (false, _, true) => Some(RoleChange::Remove),
        }
    }

    /// Metric label for this change.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RoleChange::SetPrimary => "set",
            RoleChange::Remove => "removed",
        }
    }
}

/// Applies role label changes.
#[async_trait]
pub trait PodLabeler: Send + Sync {
    /// Apply `change` to `pod`, conditioned on the pod's observed `resourceVersion`.
    async fn apply(&self, pod: &Pod, change: RoleChange) -> Result<()>;
}

/// [`PodLabeler`] writing JSON merge patches through the Kubernetes API.
#[derive(Clone)]
pub struct KubePodLabeler {
    client: Client,
}

impl KubePodLabeler {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PodLabeler for KubePodLabeler {
    async fn apply(&self, pod: &Pod, change: RoleChange) -> Result<()> {
        let namespace = pod.namespace().unwrap_or_default();
        let params = PatchParams {
            field_manager: Some(FIELD_MANAGER.to_string()),
            ..PatchParams::default()
        };
        Api::<Pod>::namespaced(self.client.clone(), &namespace)
            .patch(&pod.name_any(), &params, &Patch::Merge(role_label_patch(pod, change)))
            .await?;
        Ok(())
    }
}

/// Merge patch touching only the role label.
///
/// Removal is expressed as `null`; other labels are never sent.
#[must_use]
pub fn role_label_patch(pod: &Pod, change: RoleChange) -> Value {
    let value = match change {
        RoleChange::SetPrimary => Value::String(ROLE_PRIMARY.to_string()),
        RoleChange::Remove => Value::Null,
    };
    json!({
        "metadata": {
            "labels": { ROLE_LABEL: value },
            "resourceVersion": pod.metadata.resource_version,
        }
    })
}
