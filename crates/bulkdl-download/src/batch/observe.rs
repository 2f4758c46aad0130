//! Applying backend observations to singles.

use bulkdl_core::{BackendId, BackendSnapshot, BackendState, BatchItem, ItemId, SingleStatus};

use super::Batch;

/// What the tracker learned about one transfer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub state: Option<BackendState>,
    /// Progress in percent, `None` when the total size is unknown.
    pub percent: Option<f64>,
}

impl Observation {
    /// Observation carrying only a state.
    pub const fn state(state: BackendState) -> Self {
        Self {
            state: Some(state),
            percent: None,
        }
    }
}

impl From<BackendSnapshot> for Observation {
    fn from(snapshot: BackendSnapshot) -> Self {
        Self {
            state: Some(snapshot.state),
            percent: snapshot.percent(),
        }
    }
}

/// Result of applying an [`Observation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationOutcome {
    /// No single owns this transfer.
    Unknown,
    /// The single is already completed or failed.
    Ignored,
    /// Below the write threshold and no status change.
    Unchanged,
    /// Progress or status changed.
    Updated,
    Completed(ItemId),
    Failed(ItemId),
}

impl ObservationOutcome {
    /// Whether the collection was modified.
    pub const fn is_change(&self) -> bool {
        matches!(self, Self::Updated | Self::Completed(_) | Self::Failed(_))
    }

    /// Whether the single reached a terminal state.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

impl Batch {
    /// Apply an observation to the single owning `backend_id`.
    ///
    /// Terminal states always apply. Otherwise progress is written only when
    /// it moved by at least `threshold` percentage points or the status
    /// changes (a paused single observed in progress is downloading again).
    pub fn apply_observation(
        &mut self,
        backend_id: BackendId,
        observation: Observation,
        threshold: f64,
    ) -> ObservationOutcome {
        let Some(single) = self
            .items
            .iter_mut()
            .filter_map(BatchItem::as_single_mut)
            .find(|s| s.file.backend_id == Some(backend_id))
        else {
            return ObservationOutcome::Unknown;
        };

        if single.status.is_terminal() {
            return ObservationOutcome::Ignored;
        }

        match observation.state {
            Some(BackendState::Complete) => {
                single.status = SingleStatus::Completed;
                single.file.progress = 100.0;
                single.error = None;
                return ObservationOutcome::Completed(single.id.clone());
            }
            Some(BackendState::Interrupted) => {
                single.fail("download interrupted");
                return ObservationOutcome::Failed(single.id.clone());
            }
            _ => {}
        }

        let status_changed = observation.state == Some(BackendState::InProgress)
            && single.status == SingleStatus::Paused;
        if status_changed {
            single.status = SingleStatus::Downloading;
        }

        let progress_changed = observation.percent.is_some_and(|percent| {
            let moved = (percent - single.file.progress).abs();
            let write = moved >= threshold || (status_changed && moved > 0.0);
            if write {
                single.file.progress = percent.clamp(0.0, 100.0);
            }
            write
        });

        if status_changed || progress_changed {
            ObservationOutcome::Updated
        } else {
            ObservationOutcome::Unchanged
        }
    }
}
