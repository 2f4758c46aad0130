//! Progress tracker: backend change listener and poller.
//!
//! Both paths end in the same observation rule on the collection. Terminal
//! observations request a tick so freed slots are refilled.

use std::sync::atomic::Ordering;

use tokio::sync::broadcast::error::RecvError;
use tokio::time::{MissedTickBehavior, interval};

use bulkdl_core::{BackendChange, BackendId, BackendSnapshot, BatchError, BatchEvent};

use super::BatchManager;
use crate::batch::{Observation, ObservationOutcome};

impl BatchManager {
    /// Spawn the backend change listener once.
    pub(super) fn ensure_listener(&self) {
        if self
            .listener_started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };

        let mut changes = self.backend.subscribe();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    () = shutdown.cancelled() => break,
                    received = changes.recv() => match received {
                        Ok(change) => manager.handle_backend_change(change).await,
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::debug!(target: "bulkdl.tracker", skipped, "Change listener lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            tracing::debug!(target: "bulkdl.tracker", "Change listener stopped");
        });
    }

    /// Apply one backend change notification.
    ///
    /// Terminal states apply immediately. Anything else triggers a throttled
    /// query whose result goes through the regular observation rule.
    pub async fn handle_backend_change(&self, change: BackendChange) {
        if let Some(state) = change.state.filter(|state| state.is_terminal()) {
            self.query_throttle.lock().await.forget(change.id);
            self.observe(change.id, Observation::state(state)).await;
            return;
        }

        if !self.query_throttle.lock().await.should_query(change.id) {
            return;
        }
        match self.backend.query(change.id).await {
            Ok(snapshot) => self.apply_snapshot(change.id, snapshot).await,
            Err(e) => {
                tracing::debug!(target: "bulkdl.tracker", backend_id = %change.id, error = %e, "Query failed");
            }
        }
    }

    pub(super) async fn apply_snapshot(&self, id: BackendId, snapshot: BackendSnapshot) {
        self.observe(id, Observation::from(snapshot)).await;
    }

    async fn observe(&self, id: BackendId, observation: Observation) {
        let threshold = self.config.progress_write_threshold;
        let outcome = match self
            .store
            .update(|batch| batch.apply_observation(id, observation, threshold))
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(target: "bulkdl.tracker", backend_id = %id, error = %e, "Failed to record progress");
                return;
            }
        };

        match outcome {
            ObservationOutcome::Completed(item) => {
                tracing::info!(target: "bulkdl.tracker", id = %item, "Download completed");
                self.event_emitter.emit(BatchEvent::ItemCompleted { id: item });
                self.request_tick();
            }
            ObservationOutcome::Failed(item) => {
                tracing::warn!(target: "bulkdl.tracker", id = %item, "Download interrupted");
                self.event_emitter
                    .emit(BatchEvent::failed(item, "download interrupted"));
                self.request_tick();
            }
            _ => {}
        }
    }

    /// Query the next batch of active transfers, round-robin.
    ///
    /// Returns false when no transfer is downloading or paused anymore.
    pub async fn poll_once(&self) -> Result<bool, BatchError> {
        let targets = self.store.load().await?.transfer_ids();
        if targets.is_empty() {
            return Ok(false);
        }

        for id in next_poll_window(&targets, &self.poll_cursor, self.config.poll_batch_size) {
            match self.backend.query(id).await {
                Ok(snapshot) => self.apply_snapshot(id, snapshot).await,
                Err(e) => {
                    tracing::debug!(target: "bulkdl.tracker", backend_id = %id, error = %e, "Poll query failed");
                }
            }
        }
        Ok(true)
    }

    /// Start the poller unless it is already running.
    pub(super) async fn ensure_poller(&self) {
        let mut poller = self.poller.lock().await;
        if poller.as_ref().is_some_and(|token| !token.is_cancelled()) {
            return;
        }
        let Some(manager) = self.weak_self.upgrade() else {
            return;
        };

        let token = self.shutdown.child_token();
        *poller = Some(token.clone());
        let period = self.config.poll_interval;

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick of an interval completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;

                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        match manager.poll_once().await {
                            Ok(true) => {}
                            Ok(false) => break,
                            Err(e) => {
                                tracing::warn!(target: "bulkdl.tracker", error = %e, "Poll failed");
                            }
                        }
                    }
                }
            }

            token.cancel();
            tracing::debug!(target: "bulkdl.tracker", "Poller stopped");
        });
    }

    pub(super) async fn stop_poller(&self) {
        if let Some(token) = self.poller.lock().await.take() {
            token.cancel();
        }
    }
}

/// Pick up to `size` ids starting at the cursor, wrapping around, and advance
/// the cursor past them.
fn next_poll_window(
    targets: &[BackendId],
    cursor: &std::sync::atomic::AtomicUsize,
    size: usize,
) -> Vec<BackendId> {
    let len = targets.len();
    let take = size.min(len);
    let start = cursor.load(Ordering::SeqCst) % len;
    cursor.store((start + take) % len, Ordering::SeqCst);

    (0..take).map(|offset| targets[(start + offset) % len]).collect()
}
