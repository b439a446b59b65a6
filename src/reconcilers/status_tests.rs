// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `status.rs`

#[cfg(test)]
mod tests {
    use crate::crd::{MySQLCluster, MySQLClusterSpec, MySQLClusterStatus};
    use crate::reconcilers::status::{
        conditions_equal, create_condition, find_condition, update_condition_in_memory,
        MySQLClusterStatusUpdater,
    };

    const CONDITION_TYPE: &str = "CertificatesReady";
    const STATUS_TRUE: &str = "True";
    const STATUS_FALSE: &str = "False";

    fn cluster(status: Option<MySQLClusterStatus>) -> MySQLCluster {
        let mut cluster = MySQLCluster::new(
            "db-0",
            MySQLClusterSpec {
                replicas: Some(3),
                version: None,
                tls: None,
            },
        );
        cluster.metadata.namespace = Some("ns".to_string());
        cluster.status = status;
        cluster
    }

    #[test]
    fn test_create_condition_basic() {
        let condition = create_condition(CONDITION_TYPE, STATUS_TRUE, "SecretsIssued", "ok");

        assert_eq!(condition.r#type, CONDITION_TYPE);
        assert_eq!(condition.status, STATUS_TRUE);
        assert_eq!(condition.reason.as_deref(), Some("SecretsIssued"));
        assert_eq!(condition.message.as_deref(), Some("ok"));
        assert!(condition.last_transition_time.is_some());
    }

    #[test]
    fn test_find_condition() {
        let conditions = vec![
            create_condition("Ready", STATUS_TRUE, "Ready", "ready"),
            create_condition(CONDITION_TYPE, STATUS_FALSE, "SecretPending", "waiting"),
        ];
        let found = find_condition(&conditions, CONDITION_TYPE).unwrap();
        assert_eq!(found.status, STATUS_FALSE);
        assert!(find_condition(&conditions, "Degraded").is_none());
        assert!(find_condition(&[], CONDITION_TYPE).is_none());
    }

    #[test]
    fn test_update_preserves_transition_time_when_status_unchanged() {
        let mut original = create_condition(CONDITION_TYPE, STATUS_FALSE, "SecretPending", "a");
        original.last_transition_time = Some("2025-01-01T00:00:00+00:00".to_string());
        let mut conditions = vec![original];

        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_FALSE,
            "SecretPending",
            "b",
        );

        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message.as_deref(), Some("b"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_update_resets_transition_time_on_status_change() {
        let mut original = create_condition(CONDITION_TYPE, STATUS_FALSE, "SecretPending", "a");
        original.last_transition_time = Some("2025-01-01T00:00:00+00:00".to_string());
        let mut conditions = vec![original];

        update_condition_in_memory(
            &mut conditions,
            CONDITION_TYPE,
            STATUS_TRUE,
            "SecretsIssued",
            "done",
        );

        assert_eq!(conditions[0].status, STATUS_TRUE);
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2025-01-01T00:00:00+00:00")
        );
    }

    #[test]
    fn test_conditions_equal_ignores_timestamps() {
        let mut a = create_condition(CONDITION_TYPE, STATUS_TRUE, "SecretsIssued", "ok");
        let mut b = a.clone();
        a.last_transition_time = Some("t1".to_string());
        b.last_transition_time = Some("t2".to_string());
        assert!(conditions_equal(&[a.clone()], &[b]));

        let c = create_condition(CONDITION_TYPE, STATUS_FALSE, "SecretPending", "ok");
        assert!(!conditions_equal(&[a.clone()], &[c]));
        assert!(!conditions_equal(&[a], &[]));
    }

    #[test]
    fn test_updater_first_status_is_a_change() {
        let mut updater = MySQLClusterStatusUpdater::new(&cluster(None));
        updater.set_condition(CONDITION_TYPE, STATUS_TRUE, "SecretsIssued", "ok");
        assert!(updater.has_changes());
        assert_eq!(updater.conditions().len(), 1);
    }

    #[test]
    fn test_updater_unchanged_status_skips_write() {
        let existing = MySQLClusterStatus {
            conditions: vec![create_condition(
                CONDITION_TYPE,
                STATUS_TRUE,
                "SecretsIssued",
                "ok",
            )],
            observed_generation: Some(2),
        };
        let mut updater = MySQLClusterStatusUpdater::new(&cluster(Some(existing)));
        updater.set_condition(CONDITION_TYPE, STATUS_TRUE, "SecretsIssued", "ok");
        updater.set_observed_generation(Some(2));

        assert!(!updater.has_changes());
    }

    #[test]
    fn test_updater_generation_bump_is_a_change() {
        let existing = MySQLClusterStatus {
            conditions: vec![],
            observed_generation: Some(1),
        };
        let mut updater = MySQLClusterStatusUpdater::new(&cluster(Some(existing)));
        updater.set_observed_generation(Some(2));
        assert!(updater.has_changes());
    }
}
