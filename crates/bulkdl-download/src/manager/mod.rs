//! Batch manager implementation.
//!
//! This module provides the concrete implementation of `BatchManagerPort`:
//! a single-flight tick runner over the persisted collection, a progress
//! tracker fed by backend notifications and polling, and the operator
//! actions.
//!
//! # Architecture
//!
//! - **Scheduler** (`scheduler.rs`): one tick merges, resolves, dispatches
//!   and re-aggregates, persisting after each step
//! - **Tracker** (`tracker.rs`): backend change listener plus a poller that
//!   runs while transfers are active
//! - **Actions** (this file): pure batch transitions followed by best-effort
//!   backend control calls
//!
//! # Concurrency Model
//!
//! - `request_tick` sets `scheduled`; a drain task runs ticks while it is set
//! - `running` guarantees at most one drain task, so tick bodies never overlap
//! - The item store serialises every read-modify-write in this process
//! - Adapter calls never happen while the store lock is held
//! - A failed tick schedules another one after `poll_interval`

mod recovery;
mod scheduler;
mod tracker;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use bulkdl_core::{
    BackendError, BackendId, BatchConfig, BatchError, BatchEvent, BatchEventEmitterPort, BatchItem,
    BatchManagerPort, BatchResult, BusySignalPort, DownloadBackendPort, ItemId, KeyValueStore,
    ResolverPort, SelectedItem,
};

use crate::progress::QueryThrottle;
use crate::store::ItemStore;

pub use scheduler::TickReport;

/// Dependencies for creating a batch manager.
///
/// This struct bundles all the ports and configuration needed
/// to construct a `BatchManager`.
pub struct BatchManagerDeps {
    /// Storage for the collection and the incoming buffer.
    pub store: Arc<dyn KeyValueStore>,
    /// Turns source URLs into downloadable files.
    pub resolver: Arc<dyn ResolverPort>,
    /// Performs the transfers.
    pub backend: Arc<dyn DownloadBackendPort>,
    /// Busy indicator.
    pub busy_signal: Arc<dyn BusySignalPort>,
    /// Port for emitting batch events.
    pub event_emitter: Arc<dyn BatchEventEmitterPort>,
    pub config: BatchConfig,
}

/// Build a batch manager from its dependencies.
///
/// The returned manager can be stored as `Arc<dyn BatchManagerPort>` in
/// adapters. No task is spawned until the first tick is requested.
pub fn build_batch_manager(deps: BatchManagerDeps) -> Arc<BatchManager> {
    Arc::new_cyclic(|weak_self| BatchManager {
        store: ItemStore::new(deps.store),
        resolver: deps.resolver,
        backend: deps.backend,
        busy_signal: deps.busy_signal,
        event_emitter: deps.event_emitter,
        query_throttle: Mutex::new(QueryThrottle::new(deps.config.query_throttle)),
        config: deps.config,
        weak_self: weak_self.clone(),
        running: AtomicBool::new(false),
        scheduled: AtomicBool::new(false),
        ticks_run: AtomicU64::new(0),
        listener_started: AtomicBool::new(false),
        poller: Mutex::new(None),
        poll_cursor: AtomicUsize::new(0),
        prev_busy: Mutex::new(None),
        shutdown: CancellationToken::new(),
    })
}

/// Concrete implementation of the batch manager.
///
/// Built once per process; all runner state lives on this instance.
pub struct BatchManager {
    store: ItemStore,
    resolver: Arc<dyn ResolverPort>,
    backend: Arc<dyn DownloadBackendPort>,
    busy_signal: Arc<dyn BusySignalPort>,
    event_emitter: Arc<dyn BatchEventEmitterPort>,
    config: BatchConfig,
    /// Handle used to hand owned references to spawned tasks.
    weak_self: Weak<Self>,
    /// A drain task is running.
    running: AtomicBool,
    /// Another tick was requested.
    scheduled: AtomicBool,
    /// Number of tick bodies executed by drain tasks.
    ticks_run: AtomicU64,
    /// Whether the backend change listener has been spawned.
    listener_started: AtomicBool,
    /// Cancellation handle of the running poller, if any.
    poller: Mutex<Option<CancellationToken>>,
    /// Round-robin position of the poller.
    poll_cursor: AtomicUsize,
    query_throttle: Mutex<QueryThrottle>,
    /// Last busy state, for transition detection.
    prev_busy: Mutex<Option<bool>>,
    shutdown: CancellationToken,
}

impl BatchManager {
    /// Configuration this manager was built with.
    pub const fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Number of tick bodies the drain loop has executed.
    pub fn ticks_run(&self) -> u64 {
        self.ticks_run.load(Ordering::SeqCst)
    }

    /// Whether a drain task is currently running.
    pub fn is_ticking(&self) -> bool {
        self.running.load(Ordering::SeqCst) || self.scheduled.load(Ordering::SeqCst)
    }

    /// Whether the poller is currently running.
    pub async fn is_polling(&self) -> bool {
        self.poller
            .lock()
            .await
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Request a tick.
    ///
    /// Does nothing when automatic ticking is disabled. Any number of
    /// requests made while a tick runs result in at most one more tick.
    pub fn request_tick(&self) {
        if !self.config.auto_tick {
            return;
        }
        self.ensure_listener();

        self.scheduled.store(true, Ordering::SeqCst);
        self.spawn_drain();
    }

    fn spawn_drain(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let Some(manager) = self.weak_self.upgrade() else {
            self.running.store(false, Ordering::SeqCst);
            return;
        };
        tokio::spawn(async move {
            manager.drain_ticks().await;
        });
    }

    /// Run ticks until no more are scheduled.
    async fn drain_ticks(&self) {
        loop {
            while self.scheduled.swap(false, Ordering::SeqCst) {
                if self.shutdown.is_cancelled() {
                    break;
                }
                self.ticks_run.fetch_add(1, Ordering::SeqCst);

                match self.tick().await {
                    Ok(report) => {
                        if report.reschedule {
                            self.scheduled.store(true, Ordering::SeqCst);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(target: "bulkdl.scheduler", error = %e, "Tick failed");
                        self.retry_later();
                    }
                }
            }

            self.running.store(false, Ordering::SeqCst);

            // A request may have landed between the last swap and the release.
            if !self.scheduled.load(Ordering::SeqCst)
                || self.shutdown.is_cancelled()
                || self
                    .running
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                break;
            }
        }
    }

    /// Request a tick after one poll interval.
    ///
    /// Items a failed tick left behind are picked up again without waiting
    /// for an outside trigger.
    fn retry_later(&self) {
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };
        let shutdown = self.shutdown.clone();
        let delay = self.config.poll_interval;
        tokio::spawn(async move {
            tokio::select! {
                () = shutdown.cancelled() => {}
                () = tokio::time::sleep(delay) => manager.request_tick(),
            }
        });
    }

    /// Stop the listener, the poller and any further ticks.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        if let Some(token) = self.poller.lock().await.take() {
            token.cancel();
        }
    }

    /// Update the busy indicator, emitting an event on transitions.
    async fn set_busy(&self, busy: bool) {
        self.busy_signal.set_busy(busy);

        let mut prev = self.prev_busy.lock().await;
        if *prev != Some(busy) {
            *prev = Some(busy);
            if busy {
                tracing::debug!(target: "bulkdl.scheduler", "Batch busy");
            } else {
                tracing::info!(target: "bulkdl.scheduler", "Batch drained");
            }
            self.event_emitter.emit(BatchEvent::BusyChanged { busy });
        }
    }

    /// Issue best-effort control calls for a list of transfers.
    async fn control_all(&self, ids: Vec<BackendId>, op: ControlOp) {
        for id in ids {
            let result = match op {
                ControlOp::Pause => self.backend.pause(id).await,
                ControlOp::Resume => self.backend.resume(id).await,
                ControlOp::Cancel => self.cancel_transfer(id).await,
            };
            if let Err(e) = result {
                tracing::debug!(
                    target: "bulkdl.actions",
                    backend_id = %id,
                    op = ?op,
                    error = %e,
                    "Backend control call failed"
                );
            }
        }
    }

    /// Cancel a transfer that is no longer tracked by any item.
    async fn cancel_transfer(&self, id: BackendId) -> Result<(), BackendError> {
        self.query_throttle.lock().await.forget(id);
        self.backend.cancel(id).await
    }
}

#[derive(Debug, Clone, Copy)]
enum ControlOp {
    Pause,
    Resume,
    Cancel,
}

#[async_trait]
impl BatchManagerPort for BatchManager {
    async fn enqueue(&self, items: Vec<SelectedItem>) -> BatchResult<()> {
        let added = self
            .store
            .update_incoming(|incoming| {
                let before = incoming.len();
                for item in items {
                    if !incoming.iter().any(|existing| existing.id == item.id) {
                        incoming.push(item);
                    }
                }
                incoming.len() - before
            })
            .await?;

        tracing::debug!(target: "bulkdl.actions", added, "Enqueued selections");
        self.set_busy(true).await;
        self.request_tick();
        Ok(())
    }

    async fn retry(&self, id: &ItemId) -> BatchResult<()> {
        let reset = self.store.update(|batch| batch.retry(id)).await??;
        tracing::debug!(target: "bulkdl.actions", %id, reset, "Retry");
        self.request_tick();
        Ok(())
    }

    async fn retry_all_failed(&self) -> BatchResult<()> {
        let reset = self.store.update(|batch| batch.retry_all_failed()).await?;
        tracing::debug!(target: "bulkdl.actions", reset, "Retry all failed");
        self.request_tick();
        Ok(())
    }

    async fn pause_all(&self) -> BatchResult<()> {
        let to_pause = self.store.update(|batch| batch.pause_all()).await?;
        self.control_all(to_pause, ControlOp::Pause).await;
        self.request_tick();
        Ok(())
    }

    async fn resume_all(&self) -> BatchResult<()> {
        let to_resume = self.store.update(|batch| batch.resume_all()).await?;
        self.control_all(to_resume, ControlOp::Resume).await;
        self.request_tick();
        Ok(())
    }

    async fn remove(&self, id: &ItemId) -> BatchResult<()> {
        let to_cancel = self.store.update(|batch| batch.remove(id)).await??;
        tracing::debug!(target: "bulkdl.actions", %id, cancelled = to_cancel.len(), "Removed item");
        self.control_all(to_cancel, ControlOp::Cancel).await;
        self.request_tick();
        Ok(())
    }

    async fn clear_all(&self) -> BatchResult<()> {
        let to_cancel = self.store.clear_all().await?;
        tracing::debug!(target: "bulkdl.actions", cancelled = to_cancel.len(), "Cleared batch");
        self.control_all(to_cancel, ControlOp::Cancel).await;
        self.request_tick();
        Ok(())
    }

    async fn clear_completed(&self) -> BatchResult<()> {
        let to_cancel = self.store.update(|batch| batch.clear_completed()).await?;
        self.control_all(to_cancel, ControlOp::Cancel).await;
        self.request_tick();
        Ok(())
    }

    async fn show_in_folder(&self, id: &ItemId) -> BatchResult<()> {
        let batch = self.store.load().await?;
        let Some(item) = batch.get(id) else {
            return Err(BatchError::not_found(id.clone()));
        };

        let backend_id = match item {
            BatchItem::Single(single) => single.file.backend_id,
            BatchItem::Multiple(group) => group
                .children
                .iter()
                .filter_map(|child| batch.get(child).and_then(BatchItem::as_single))
                .find_map(|single| single.file.backend_id),
            BatchItem::Pending(_) => None,
        };

        let Some(backend_id) = backend_id else {
            tracing::debug!(target: "bulkdl.actions", %id, "Nothing to show yet");
            return Ok(());
        };
        if let Err(e) = self.backend.show(backend_id).await {
            tracing::debug!(target: "bulkdl.actions", %id, error = %e, "Show failed");
        }
        Ok(())
    }

    async fn items(&self) -> BatchResult<Vec<BatchItem>> {
        Ok(self.store.load().await?.into_items())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkdl_core::{MemoryKeyValueStore, NoopBatchEmitter, NoopBusySignal};

    use crate::http::{HttpBackend, HttpResolver};

    #[tokio::test]
    async fn test_cancel_forgets_throttle_state() {
        let dir = tempfile::tempdir().unwrap();
        let manager = build_batch_manager(BatchManagerDeps {
            store: Arc::new(MemoryKeyValueStore::new()),
            resolver: Arc::new(HttpResolver::new()),
            backend: Arc::new(HttpBackend::new(dir.path())),
            busy_signal: Arc::new(NoopBusySignal),
            event_emitter: Arc::new(NoopBatchEmitter),
            config: BatchConfig::default().with_auto_tick(false),
        });

        {
            let mut throttle = manager.query_throttle.lock().await;
            assert!(throttle.should_query(BackendId(7)));
            assert!(throttle.should_query(BackendId(8)));
        }

        // Unknown to the backend: the call fails but the state still goes.
        manager
            .control_all(vec![BackendId(7)], ControlOp::Cancel)
            .await;
        assert_eq!(manager.query_throttle.lock().await.len(), 1);
    }
}
