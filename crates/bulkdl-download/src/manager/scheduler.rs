//! The tick: one reconciliation pass over the collection.

use bulkdl_core::{BackendId, BatchError, BatchEvent, FileDescriptor, ItemId, ResolveError};

use super::BatchManager;
use crate::batch::ResolutionOutcome;

/// Summary of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Selections merged from the incoming buffer.
    pub merged: usize,
    /// Pending items resolved into at least one file.
    pub resolved: usize,
    /// Pending items that failed to resolve.
    pub resolve_failed: usize,
    /// Transfers started.
    pub dispatched: usize,
    /// Singles whose start failed.
    pub start_failed: usize,
    /// Whether another tick should run right away.
    pub reschedule: bool,
}

impl BatchManager {
    /// Run one tick.
    ///
    /// Phases run in order and persist before the next starts: merge,
    /// visibility, resolve, dispatch, re-aggregate, idle check. Callers that
    /// are not the drain loop may run ticks directly (tests, one-shot tools);
    /// the caller is then responsible for not overlapping them.
    ///
    /// Transitional states only exist while a tick runs, so any found at the
    /// start were left by a tick that failed midway and are reset first.
    pub async fn tick(&self) -> Result<TickReport, BatchError> {
        let mut report = TickReport::default();

        let stranded = self.store.update(|batch| batch.reset_transitional()).await?;
        if stranded > 0 {
            tracing::info!(target: "bulkdl.scheduler", stranded, "Reset items left by a failed tick");
        }

        // Merge
        let (merged, batch) = self.store.drain_incoming().await?;
        report.merged = merged;

        // Visibility
        if batch.any_active() {
            self.set_busy(true).await;
        }

        self.resolve_phase(&mut report).await?;
        self.dispatch_phase(&mut report).await?;

        // Re-aggregate (the store skips the write when nothing changed)
        self.store.update(|_| ()).await?;
        let batch = self.store.load().await?;

        // Idle check
        if batch.any_active() {
            if !batch.transfers().is_empty() {
                self.ensure_poller().await;
            }
        } else {
            self.set_busy(false).await;
            self.stop_poller().await;
        }

        report.reschedule = batch.has_unstarted_work()
            && batch.occupied_slots() < self.config.concurrency_limit;

        tracing::debug!(
            target: "bulkdl.scheduler",
            merged = report.merged,
            resolved = report.resolved,
            resolve_failed = report.resolve_failed,
            dispatched = report.dispatched,
            start_failed = report.start_failed,
            reschedule = report.reschedule,
            "Tick finished"
        );

        self.event_emitter.emit(BatchEvent::Snapshot {
            items: batch.into_items(),
        });

        Ok(report)
    }

    async fn resolve_phase(&self, report: &mut TickReport) -> Result<(), BatchError> {
        let selected = self
            .store
            .load()
            .await?
            .pending_for_resolution(self.config.resolve_per_tick);

        for (id, source_url) in selected {
            if !self.store.update(|batch| batch.mark_resolving(&id)).await? {
                continue;
            }

            let result = self.resolve_with_timeout(&source_url).await;
            if let Err(e) = self.settle_resolution(&id, result, report).await {
                return Err(self.release_after_error(&id, e).await);
            }
        }
        Ok(())
    }

    /// Persist the outcome of one resolver call.
    async fn settle_resolution(
        &self,
        id: &ItemId,
        result: Result<Vec<FileDescriptor>, ResolveError>,
        report: &mut TickReport,
    ) -> Result<(), BatchError> {
        match result {
            Ok(files) if files.is_empty() => {
                tracing::info!(target: "bulkdl.scheduler", %id, "Resolver found no files");
                let outcome = self
                    .store
                    .update(|batch| batch.apply_resolution(id, files))
                    .await?;
                if outcome == ResolutionOutcome::Failed {
                    report.resolve_failed += 1;
                    self.event_emitter
                        .emit(BatchEvent::failed(id.clone(), "no downloadable files found"));
                }
            }
            Ok(files) => {
                let count = files.len();
                let outcome = self
                    .store
                    .update(|batch| batch.apply_resolution(id, files))
                    .await?;
                if outcome == ResolutionOutcome::Vanished {
                    tracing::debug!(target: "bulkdl.scheduler", %id, "Item removed during resolution");
                    return Ok(());
                }
                tracing::debug!(target: "bulkdl.scheduler", %id, files = count, "Resolved");
                report.resolved += 1;
                self.event_emitter.emit(BatchEvent::ItemResolved {
                    id: id.clone(),
                    files: count,
                });
            }
            Err(e) => {
                tracing::warn!(target: "bulkdl.scheduler", %id, error = %e, "Resolution failed");
                self.fail_resolution(id, &e).await?;
                report.resolve_failed += 1;
            }
        }
        Ok(())
    }

    async fn resolve_with_timeout(
        &self,
        source_url: &str,
    ) -> Result<Vec<FileDescriptor>, ResolveError> {
        let call = self
            .resolver
            .resolve(source_url, &self.config.format_preference);
        tokio::time::timeout(self.config.resolve_timeout, call)
            .await
            .unwrap_or_else(|_| {
                Err(ResolveError::Timeout {
                    seconds: self.config.resolve_timeout.as_secs(),
                })
            })
    }

    async fn fail_resolution(&self, id: &ItemId, error: &ResolveError) -> Result<(), BatchError> {
        let message = error.to_string();
        if self
            .store
            .update(|batch| batch.fail_pending(id, &message))
            .await?
        {
            self.event_emitter.emit(BatchEvent::failed(id.clone(), message));
        }
        Ok(())
    }

    async fn dispatch_phase(&self, report: &mut TickReport) -> Result<(), BatchError> {
        let occupied = self.store.load().await?.occupied_slots();
        let mut capacity = self.config.concurrency_limit.saturating_sub(occupied);

        while capacity > 0 {
            let Some((id, url)) = self.store.update(|batch| batch.queue_next_resolved()).await?
            else {
                break;
            };

            match self.backend.start(&url).await {
                Ok(backend_id) => {
                    let attached = match self
                        .store
                        .update(|batch| batch.mark_started(&id, backend_id))
                        .await
                    {
                        Ok(attached) => attached,
                        Err(e) => {
                            // The transfer was never recorded, nothing would track it.
                            self.cancel_quietly(backend_id).await;
                            return Err(self.release_after_error(&id, e.into()).await);
                        }
                    };
                    if attached {
                        tracing::debug!(target: "bulkdl.scheduler", %id, %backend_id, "Download started");
                        report.dispatched += 1;
                        capacity -= 1;
                    } else {
                        tracing::debug!(
                            target: "bulkdl.scheduler",
                            %id,
                            %backend_id,
                            "Item removed while starting, cancelling download"
                        );
                        self.cancel_quietly(backend_id).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(target: "bulkdl.scheduler", %id, error = %e, "Download start failed");
                    let message = e.to_string();
                    match self
                        .store
                        .update(|batch| batch.mark_start_failed(&id, &message))
                        .await
                    {
                        Ok(true) => {
                            report.start_failed += 1;
                            self.event_emitter.emit(BatchEvent::failed(id, message));
                        }
                        Ok(false) => {}
                        Err(e) => return Err(self.release_after_error(&id, e.into()).await),
                    }
                }
            }
        }
        Ok(())
    }

    async fn cancel_quietly(&self, backend_id: BackendId) {
        if let Err(e) = self.cancel_transfer(backend_id).await {
            tracing::debug!(target: "bulkdl.scheduler", %backend_id, error = %e, "Cancel failed");
        }
    }

    /// Put an item back after a failed write so it is picked up again.
    ///
    /// If this write fails too, the next tick resets it.
    async fn release_after_error(&self, id: &ItemId, error: BatchError) -> BatchError {
        tracing::warn!(target: "bulkdl.scheduler", %id, error = %error, "Storage write failed mid-tick");
        if let Err(e) = self
            .store
            .update(|batch| batch.release_transitional(id))
            .await
        {
            tracing::debug!(target: "bulkdl.scheduler", %id, error = %e, "Release failed");
        }
        error
    }
}
