// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Watch event filtering for the role labeler.

use k8s_openapi::api::core::v1::Pod;

use crate::labels::is_managed_pod;

/// Decide whether a watch event for `new` should enqueue its key.
///
/// `old` is the cached snapshot before the event, or `None` for an add. Adds
/// always enqueue. Updates enqueue only when the object differs from the
/// cached snapshot in any field, status included.
#[must_use]
pub fn should_enqueue(old: Option<&Pod>, new: &Pod) -> bool {
    match old {
        None => true,
        Some(old) => old != new,
    }
}

/// Returns `true` if the pod carries both managed-fleet selector labels.
#[must_use]
pub fn is_managed(pod: &Pod) -> bool {
    pod.metadata.labels.as_ref().is_some_and(is_managed_pod)
}
