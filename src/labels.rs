// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common label constants and label map helpers used across the operator.
//!
//! This module defines the labels the operator reads to recognize managed MySQL
//! pods and the role label it writes for downstream routing.

use std::collections::BTreeMap;

// ============================================================================
// Managed-Fleet Selector Labels
// ============================================================================

/// Label carrying the kind of database a pod belongs to (e.g., `MySQLCluster`)
pub const DATABASE_KIND_LABEL: &str = "mysql.firestoned.io/database-kind";

/// Label carrying the name of the database instance a pod belongs to
pub const DATABASE_NAME_LABEL: &str = "mysql.firestoned.io/database-name";

// ============================================================================
// Role Label
// ============================================================================

/// Label identifying the pod currently acting as write-primary
pub const ROLE_LABEL: &str = "mysql.firestoned.io/role";

/// The only recognized role value. Absence of the label means non-primary or unknown.
pub const ROLE_PRIMARY: &str = "primary";

// ============================================================================
// Helpers
// ============================================================================

/// Returns `true` when the label map carries both managed-fleet selector labels.
///
/// Pods missing either label are not part of a managed replication group and are
/// never probed or mutated.
#[must_use]
pub fn is_managed_pod(labels: &BTreeMap<String, String>) -> bool {
    labels.contains_key(DATABASE_KIND_LABEL) && labels.contains_key(DATABASE_NAME_LABEL)
}

/// Returns `true` when the label map marks its pod as primary.
#[must_use]
pub fn is_labeled_primary(labels: &BTreeMap<String, String>) -> bool {
    labels.get(ROLE_LABEL).map(String::as_str) == Some(ROLE_PRIMARY)
}

/// Database instance name taken from the selector label, if present.
#[must_use]
pub fn database_name(labels: &BTreeMap<String, String>) -> Option<&str> {
    labels.get(DATABASE_NAME_LABEL).map(String::as_str)
}

#[cfg(test)]
#[path = "labels_tests.rs"]
mod labels_tests;
