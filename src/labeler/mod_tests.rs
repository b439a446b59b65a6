// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for the role label controller

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::labels::{DATABASE_KIND_LABEL, DATABASE_NAME_LABEL, ROLE_LABEL, ROLE_PRIMARY};
    use async_trait::async_trait;
    use k8s_openapi::api::core::v1::Pod;
    use kube::api::ObjectMeta;
    use kube::runtime::reflector;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Probe that reports a fixed primary host, or always fails.
    struct ScriptedProbe {
        primary: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn reporting(primary: &'static str) -> Arc<Self> {
            Arc::new(Self {
                primary: Some(primary),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                primary: None,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PrimaryProbe for ScriptedProbe {
        async fn primary_host(&self, pod: &Pod) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.primary {
                Some(host) => Ok(format!("{host}.db-0-gvr.ns.svc")),
                None => Err(OperatorError::EmptyResult {
                    pod: pod.name_any(),
                }),
            }
        }
    }

    /// Labeler that records every change instead of patching.
    #[derive(Default)]
    struct RecordingLabeler {
        changes: Mutex<Vec<(String, RoleChange)>>,
    }

    impl RecordingLabeler {
        fn changes(&self) -> Vec<(String, RoleChange)> {
            self.changes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PodLabeler for RecordingLabeler {
        async fn apply(&self, pod: &Pod, change: RoleChange) -> Result<()> {
            self.changes
                .lock()
                .unwrap()
                .push((pod.name_any(), change));
            Ok(())
        }
    }

    /// Labeler whose every patch is rejected by the API server.
    #[derive(Default)]
    struct ForbiddenLabeler {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PodLabeler for ForbiddenLabeler {
        async fn apply(&self, _pod: &Pod, _change: RoleChange) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OperatorError::Kube(kube::Error::Api(
                Box::new(kube::core::Status {
                    status: Some(kube::core::response::StatusSummary::Failure),
                    message: "pods \"db-0-1\" is forbidden".to_string(),
                    reason: "Forbidden".to_string(),
                    code: 403,
                    metadata: None,
                    details: None,
                }),
            )))
        }
    }

    fn pod(name: &str, managed: bool, role: Option<&str>) -> Pod {
        let mut labels = BTreeMap::new();
        if managed {
            labels.insert(DATABASE_KIND_LABEL.to_string(), "MySQLCluster".to_string());
            labels.insert(DATABASE_NAME_LABEL.to_string(), "db-0".to_string());
        }
        if let Some(role) = role {
            labels.insert(ROLE_LABEL.to_string(), role.to_string());
        }
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns".to_string()),
                labels: Some(labels),
                resource_version: Some("1".to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    struct Fixture {
        writer: reflector::store::Writer<Pod>,
        controller: Arc<RoleLabelController>,
        labeler: Arc<RecordingLabeler>,
    }

    fn controller(
        probe: Arc<ScriptedProbe>,
        labeler: Arc<dyn PodLabeler>,
        max_requeues: u32,
    ) -> (reflector::store::Writer<Pod>, Arc<RoleLabelController>) {
        let (cache, writer) = reflector::store::<Pod>();
        let controller = Arc::new(RoleLabelController::new(
            cache,
            WorkQueue::default(),
            probe,
            labeler,
            LabelerConfig {
                workers: 2,
                max_requeues,
                request_timeout: Duration::from_secs(5),
            },
        ));
        (writer, controller)
    }

    impl Fixture {
        fn new(probe: Arc<ScriptedProbe>, max_requeues: u32) -> Self {
            let labeler = Arc::new(RecordingLabeler::default());
            let (writer, controller) = controller(probe, labeler.clone(), max_requeues);
            Self {
                writer,
                controller,
                labeler,
            }
        }

        fn cache(&mut self, pod: Pod) -> PodKey {
            let key = ObjectRef::from_obj(&pod);
            self.writer.apply_watcher_event(&watcher::Event::Apply(pod));
            key
        }
    }

    #[tokio::test]
    async fn test_primary_pod_gets_label() {
        let probe = ScriptedProbe::reporting("db-0-1");
        let mut fx = Fixture::new(probe.clone(), 5);
        let key = fx.cache(pod("db-0-1", true, None));

        let change = fx.controller.process_key(&key).await.unwrap();

        assert_eq!(change, Some(RoleChange::SetPrimary));
        assert_eq!(
            fx.labeler.changes(),
            vec![("db-0-1".to_string(), RoleChange::SetPrimary)]
        );
    }

    #[tokio::test]
    async fn test_labeled_primary_is_left_alone() {
        let probe = ScriptedProbe::reporting("db-0-1");
        let mut fx = Fixture::new(probe.clone(), 5);
        let key = fx.cache(pod("db-0-1", true, Some(ROLE_PRIMARY)));

        assert_eq!(fx.controller.process_key(&key).await.unwrap(), None);
        assert!(fx.labeler.changes().is_empty());
    }

    #[tokio::test]
    async fn test_secondary_loses_label_and_primary_untouched() {
        let probe = ScriptedProbe::reporting("db-0-1");
        let mut fx = Fixture::new(probe.clone(), 5);
        fx.cache(pod("db-0-1", true, Some(ROLE_PRIMARY)));
        let key = fx.cache(pod("db-0-2", true, Some(ROLE_PRIMARY)));

        let change = fx.controller.process_key(&key).await.unwrap();

        assert_eq!(change, Some(RoleChange::Remove));
        assert_eq!(
            fx.labeler.changes(),
            vec![("db-0-2".to_string(), RoleChange::Remove)],
            "only the processed pod may be mutated"
        );
    }

    #[tokio::test]
    async fn test_unlabeled_secondary_needs_no_write() {
        let probe = ScriptedProbe::reporting("db-0-1");
        let mut fx = Fixture::new(probe.clone(), 5);
        let key = fx.cache(pod("db-0-2", true, None));

        assert_eq!(fx.controller.process_key(&key).await.unwrap(), None);
        assert!(fx.labeler.changes().is_empty());
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test]
    async fn test_unmanaged_pod_is_ignored() {
        let probe = ScriptedProbe::reporting("web-0");
        let mut fx = Fixture::new(probe.clone(), 5);
        let key = fx.cache(pod("web-0", false, None));

        assert_eq!(fx.controller.process_key(&key).await.unwrap(), None);
        assert_eq!(probe.calls(), 0, "unmanaged pods are never probed");
        assert!(fx.labeler.changes().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_pod_takes_no_action() {
        let probe = ScriptedProbe::reporting("db-0-1");
        let fx = Fixture::new(probe.clone(), 5);
        let key = ObjectRef::<Pod>::new("db-0-1").within("ns");

        assert_eq!(fx.controller.process_key(&key).await.unwrap(), None);
        assert_eq!(probe.calls(), 0);
    }

    #[tokio::test]
    async fn test_probe_error_is_not_treated_as_secondary() {
        let probe = ScriptedProbe::failing();
        let mut fx = Fixture::new(probe.clone(), 5);
        let key = fx.cache(pod("db-0-1", true, Some(ROLE_PRIMARY)));

        assert!(fx.controller.process_key(&key).await.is_err());
        assert!(
            fx.labeler.changes().is_empty(),
            "a failed probe must not remove the label"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_key_attempted_max_requeues_plus_one() {
        let probe = ScriptedProbe::failing();
        let mut fx = Fixture::new(probe.clone(), 3);
        let key = fx.cache(pod("db-0-1", true, None));
        let queue = fx.controller.queue();

        let runner = tokio::spawn(Arc::clone(&fx.controller).run());
        queue.add(key.clone());

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(probe.calls(), 4);
        assert_eq!(queue.num_requeues(&key), 0, "dropped keys are forgotten");
        assert!(queue.is_empty());

        queue.shut_down();
        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_patch_retried_with_backoff() {
        let probe = ScriptedProbe::reporting("db-0-1");
        let labeler = Arc::new(ForbiddenLabeler::default());
        let (mut writer, controller) = controller(probe.clone(), labeler.clone(), 3);
        let unlabeled = pod("db-0-1", true, None);
        let key = ObjectRef::from_obj(&unlabeled);
        writer.apply_watcher_event(&watcher::Event::Apply(unlabeled));
        let queue = controller.queue();

        let runner = tokio::spawn(Arc::clone(&controller).run());
        queue.add(key.clone());

        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(probe.calls(), 4);
        assert_eq!(
            labeler.calls.load(Ordering::SeqCst),
            4,
            "a forbidden patch is retried until the budget is spent"
        );
        assert_eq!(queue.num_requeues(&key), 0);
        assert!(queue.is_empty());

        queue.shut_down();
        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_key_retried_on_next_event() {
        let probe = ScriptedProbe::failing();
        let mut fx = Fixture::new(probe.clone(), 0);
        let key = fx.cache(pod("db-0-1", true, None));
        let queue = fx.controller.queue();

        let runner = tokio::spawn(Arc::clone(&fx.controller).run());
        queue.add(key.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(probe.calls(), 1);

        queue.add(key);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(probe.calls(), 2);

        queue.shut_down();
        runner.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_workers_drain_queue_and_stop() {
        let probe = ScriptedProbe::reporting("db-0-0");
        let mut fx = Fixture::new(probe.clone(), 5);
        let queue = fx.controller.queue();
        for name in ["db-0-0", "db-0-1", "db-0-2"] {
            let key = fx.cache(pod(name, true, None));
            queue.add(key);
        }

        let runner = tokio::spawn(Arc::clone(&fx.controller).run());
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(probe.calls(), 3);
        assert_eq!(
            fx.labeler.changes(),
            vec![("db-0-0".to_string(), RoleChange::SetPrimary)]
        );

        queue.shut_down();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("workers must stop after shutdown")
            .unwrap();
    }

    #[test]
    fn test_event_handler_delete_enqueues_nothing() {
        let (cache, writer) = reflector::store::<Pod>();
        let queue = WorkQueue::<PodKey>::default();
        let mut handler = PodEventHandler::new(writer, queue.clone());

        let original = pod("db-0-0", true, None);
        handler.handle(&watcher::Event::Apply(original.clone()));
        assert_eq!(queue.len(), 1);

        handler.handle(&watcher::Event::Delete(original));
        assert_eq!(queue.len(), 1, "deletes enqueue nothing");
        assert!(cache.state().is_empty());
    }

    #[tokio::test]
    async fn test_event_handler_filters_identical_updates() {
        let (_cache, writer) = reflector::store::<Pod>();
        let queue = WorkQueue::<PodKey>::default();
        let mut handler = PodEventHandler::new(writer, queue.clone());

        let original = pod("db-0-0", true, None);
        handler.handle(&watcher::Event::Apply(original.clone()));
        let key = queue.get().await.unwrap();
        queue.done(&key);

        handler.handle(&watcher::Event::Apply(original.clone()));
        assert!(queue.is_empty(), "unchanged object must not be re-enqueued");

        let mut changed = original;
        changed.metadata.resource_version = Some("2".to_string());
        handler.handle(&watcher::Event::Apply(changed));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_event_handler_defers_initial_list_until_synced() {
        let (cache, writer) = reflector::store::<Pod>();
        let queue = WorkQueue::<PodKey>::default();
        let mut handler = PodEventHandler::new(writer, queue.clone());

        handler.handle(&watcher::Event::Init);
        handler.handle(&watcher::Event::InitApply(pod("db-0-0", true, None)));
        handler.handle(&watcher::Event::InitApply(pod("db-0-1", true, None)));
        assert!(queue.is_empty());

        handler.handle(&watcher::Event::InitDone);
        assert_eq!(queue.len(), 2);
        assert_eq!(cache.state().len(), 2);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = LabelerConfig {
            workers: 0,
            ..LabelerConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(OperatorError::Configuration(_))
        ));
    }
}
