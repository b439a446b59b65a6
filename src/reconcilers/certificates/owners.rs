// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Owner reference bookkeeping for issued certificate secrets.
//!
//! A secret issued for a `MySQLCluster` is owned by both its `Certificate` and the
//! cluster itself. References are identified by `(kind, name)`; adding one that
//! is already present is a no-op.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

/// Insert or refresh `reference` in `owners`.
///
/// - An existing entry with the same `(kind, name)` and `uid` is left untouched.
/// - An existing entry with the same `(kind, name)` but a different `uid` (the
///   owner was deleted and recreated) is replaced in place.
/// - Otherwise the reference is appended.
///
/// Kubernetes allows at most one controller reference per object, so a new
/// controller reference is stored with `controller: false` when a different
/// owner already holds that role.
///
/// # Returns
///
/// `true` if `owners` changed and must be written back.
pub fn ensure_owner_reference(owners: &mut Vec<OwnerReference>, reference: OwnerReference) -> bool {
    let mut reference = reference;
    let other_controller = owners.iter().any(|existing| {
        existing.controller == Some(true) && !same_owner(existing, &reference)
    });
    if other_controller && reference.controller == Some(true) {
        reference.controller = Some(false);
    }

    match owners.iter_mut().find(|existing| same_owner(existing, &reference)) {
        Some(existing) if existing.uid == reference.uid => false,
        Some(existing) => {
            *existing = reference;
            true
        }
        None => {
            owners.push(reference);
            true
        }
    }
}

/// Returns `true` if `owners` already holds `reference`, uid included.
///
/// A reference to a deleted and recreated owner does not count.
#[must_use]
pub fn has_owner(owners: &[OwnerReference], reference: &OwnerReference) -> bool {
    owners
        .iter()
        .any(|o| same_owner(o, reference) && o.uid == reference.uid)
}

fn same_owner(a: &OwnerReference, b: &OwnerReference) -> bool {
    a.kind == b.kind && a.name == b.name
}

#[cfg(test)]
#[path = "owners_tests.rs"]
mod owners_tests;
