// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Role label controller.
//!
//! Keeps the `mysql.firestoned.io/role=primary` label on whichever managed pod
//! is the current group replication primary.
//!
//! ## Flow
//!
//! 1. A pod watch feeds a local reflector cache through [`PodEventHandler`],
//!    which enqueues pod keys on adds and on updates that change the object.
//! 2. A fixed pool of workers drains one de-duplicating [`WorkQueue`]; a key is
//!    never processed by two workers at once.
//! 3. For each key, the cached pod is probed and its role label set or removed.
//!    Only the pod being processed is ever patched.
//!
//! Failures are re-queued with exponential backoff until the retry budget is
//! spent, after which the key waits for the next watch event.

pub mod credentials;
pub mod filter;
pub mod patcher;
pub mod probe;
pub mod queue;

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::reflector::{ObjectRef, Store};
use kube::runtime::{reflector::store::Writer, watcher};
use kube::ResourceExt;
use tracing::{debug, error, info, trace, warn};

use self::filter::{is_managed, should_enqueue};
use self::patcher::{PodLabeler, RoleChange};
use self::probe::PrimaryProbe;
use self::queue::WorkQueue;
use crate::constants::{DEFAULT_LABELER_WORKERS, DEFAULT_MAX_REQUEUES, DEFAULT_PROBE_TIMEOUT_SECS};
use crate::errors::{within_deadline, OperatorError, Result};
use crate::labels::database_name;
use crate::metrics;

/// Key identifying one pod in the queue and the cache.
pub type PodKey = ObjectRef<Pod>;

/// Resource type label used for labeler metrics.
const POD_RESOURCE: &str = "Pod";

/// Runtime settings for [`RoleLabelController`].
#[derive(Clone, Debug)]
pub struct LabelerConfig {
    /// Number of concurrent workers
    pub workers: usize,
    /// Rate-limited re-adds allowed before a failing key is dropped
    pub max_requeues: u32,
    /// Deadline for each label patch
    pub request_timeout: Duration,
}

impl Default for LabelerConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_LABELER_WORKERS,
            max_requeues: DEFAULT_MAX_REQUEUES,
            request_timeout: Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS),
        }
    }
}

/// Translates watch events into cache updates and queue adds.
pub struct PodEventHandler {
    writer: Writer<Pod>,
    cache: Store<Pod>,
    queue: WorkQueue<PodKey>,
    pending_init: Vec<PodKey>,
}

impl PodEventHandler {
    #[must_use]
    pub fn new(writer: Writer<Pod>, queue: WorkQueue<PodKey>) -> Self {
        let cache = writer.as_reader();
        Self {
            writer,
            cache,
            queue,
            pending_init: Vec::new(),
        }
    }

    /// Apply `event` to the cache and enqueue the keys it affects.
    ///
    /// Objects listed during a (re)list are enqueued once the list completes,
    /// since the cache only exposes them from that point. Deletes enqueue
    /// nothing.
    pub fn handle(&mut self, event: &watcher::Event<Pod>) {
        match event {
            watcher::Event::Apply(pod) => {
                let key = ObjectRef::from_obj(pod);
                let previous = self.cache.get(&key);
                let enqueue = should_enqueue(previous.as_deref(), pod);
                self.writer.apply_watcher_event(event);
                if enqueue {
                    trace!(pod = %key.name, "Enqueueing pod");
                    self.queue.add(key);
                }
            }
            watcher::Event::Init => {
                self.pending_init.clear();
                self.writer.apply_watcher_event(event);
            }
            watcher::Event::InitApply(pod) => {
                self.pending_init.push(ObjectRef::from_obj(pod));
                self.writer.apply_watcher_event(event);
            }
            watcher::Event::InitDone => {
                self.writer.apply_watcher_event(event);
                debug!(pods = self.pending_init.len(), "Pod cache synced");
                for key in self.pending_init.drain(..) {
                    self.queue.add(key);
                }
            }
            watcher::Event::Delete(_) => self.writer.apply_watcher_event(event),
        }
    }
}

/// Watch-driven worker pool maintaining the primary role label.
pub struct RoleLabelController {
    cache: Store<Pod>,
    queue: WorkQueue<PodKey>,
    probe: Arc<dyn PrimaryProbe>,
    labeler: Arc<dyn PodLabeler>,
    config: LabelerConfig,
}

impl RoleLabelController {
    #[must_use]
    pub fn new(
        cache: Store<Pod>,
        queue: WorkQueue<PodKey>,
        probe: Arc<dyn PrimaryProbe>,
        labeler: Arc<dyn PodLabeler>,
        config: LabelerConfig,
    ) -> Self {
        Self {
            cache,
            queue,
            probe,
            labeler,
            config,
        }
    }

    /// Handle to the controller's queue.
    #[must_use]
    pub fn queue(&self) -> WorkQueue<PodKey> {
        self.queue.clone()
    }

    /// Reconcile one pod key.
    ///
    /// Returns the label change applied, or `None` when nothing was written
    /// (pod gone, not managed, or already correct).
    ///
    /// # Errors
    ///
    /// Probe and patch errors, unmodified.
    pub async fn process_key(&self, key: &PodKey) -> Result<Option<RoleChange>> {
        let Some(pod) = self.cache.get(key) else {
            debug!(pod = %key.name, "Pod no longer exists, nothing to do");
            return Ok(None);
        };
        if !is_managed(&pod) {
            trace!(pod = %key.name, "Pod is not a managed MySQL member, skipping");
            return Ok(None);
        }

        let is_primary = self.probe.is_primary(&pod).await?;
        let Some(change) = RoleChange::for_labels(pod.labels(), is_primary) else {
            debug!(pod = %key.name, is_primary, "Role label already correct");
            return Ok(None);
        };

        within_deadline(
            self.config.request_timeout,
            "role label patch",
            self.labeler.apply(&pod, change),
        )
        .await?;

        metrics::record_role_label_change(change.as_str());
        info!(
            pod = %pod.name_any(),
            namespace = %pod.namespace().unwrap_or_default(),
            database = database_name(pod.labels()).unwrap_or_default(),
            change = change.as_str(),
            "Updated role label"
        );
        Ok(Some(change))
    }

    /// Apply the retry policy to the outcome of [`Self::process_key`].
    fn handle_result(&self, key: &PodKey, result: &Result<Option<RoleChange>>, elapsed: Duration) {
        let err = match result {
            Ok(_) => {
                metrics::record_reconciliation_success(POD_RESOURCE, elapsed);
                self.queue.forget(key);
                return;
            }
            Err(err) => err,
        };
        metrics::record_reconciliation_error(POD_RESOURCE, elapsed);

        let attempt = self.queue.num_requeues(key);
        if attempt < self.config.max_requeues {
            debug!(pod = %key.name, attempt, error = %err, "Requeueing pod with backoff");
            self.queue.add_rate_limited(key.clone());
            metrics::record_queue_requeue();
        } else {
            warn!(
                pod = %key.name,
                attempts = attempt + 1,
                error = %err,
                "Retry budget exhausted, dropping pod key until next watch event"
            );
            self.queue.forget(key);
            metrics::record_queue_drop();
        }
    }

    async fn run_worker(self: Arc<Self>, id: usize) {
        debug!(worker = id, "Role label worker started");
        while let Some(key) = self.queue.get().await {
            let start = Instant::now();
            let result = self.process_key(&key).await;
            self.handle_result(&key, &result, start.elapsed());
            self.queue.done(&key);
        }
        debug!(worker = id, "Role label worker stopped");
    }

    /// Run the worker pool until the queue is shut down.
    ///
    /// In-flight keys finish before this returns.
    pub async fn run(self: Arc<Self>) {
        let workers = self.config.workers;
        info!(workers, max_requeues = self.config.max_requeues, "Starting role label controller");

        let handles: Vec<_> = (0..workers)
            .map(|id| tokio::spawn(Arc::clone(&self).run_worker(id)))
            .collect();
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "Role label worker panicked");
            }
        }
        info!("Role label controller stopped");
    }
}

/// Ensure the labeler can run before any watch is started.
///
/// # Errors
///
/// [`OperatorError::Configuration`] if `workers` is zero.
pub fn validate_config(config: &LabelerConfig) -> Result<()> {
    if config.workers == 0 {
        return Err(OperatorError::Configuration(
            "labeler needs at least one worker".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
