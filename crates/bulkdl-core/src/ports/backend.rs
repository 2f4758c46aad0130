//! Download backend port.
//!
//! The backend owns the actual byte transfer. The orchestrator only starts,
//! controls and observes transfers by [`BackendId`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::errors::BackendError;
use crate::items::BackendId;

/// State of one transfer as reported by the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendState {
    InProgress,
    Paused,
    Complete,
    Interrupted,
}

impl BackendState {
    /// Whether the transfer will not change on its own anymore.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Interrupted)
    }
}

/// Point-in-time view of one transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendSnapshot {
    pub received_bytes: u64,
    /// Unknown when the server did not announce a length.
    pub total_bytes: Option<u64>,
    pub state: BackendState,
}

impl BackendSnapshot {
    /// Progress in percent, clamped to `[0, 100]`; `None` if total is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> Option<f64> {
        match self.total_bytes {
            Some(total) if total > 0 => {
                Some((self.received_bytes as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
            }
            _ => None,
        }
    }
}

/// Change notification pushed by the backend.
///
/// Every field but `id` is optional; absent fields did not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackendChange {
    pub id: BackendId,
    pub state: Option<BackendState>,
    pub received_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
}

impl BackendChange {
    /// A change carrying only a new state.
    #[must_use]
    pub const fn state(id: BackendId, state: BackendState) -> Self {
        Self {
            id,
            state: Some(state),
            received_bytes: None,
            total_bytes: None,
        }
    }

    /// A change carrying only byte counters.
    #[must_use]
    pub const fn bytes(id: BackendId, received: u64, total: Option<u64>) -> Self {
        Self {
            id,
            state: None,
            received_bytes: Some(received),
            total_bytes: total,
        }
    }
}

/// Port for the component performing transfers.
#[async_trait]
pub trait DownloadBackendPort: Send + Sync {
    /// Start a transfer and return its id.
    async fn start(&self, url: &str) -> Result<BackendId, BackendError>;

    async fn pause(&self, id: BackendId) -> Result<(), BackendError>;

    async fn resume(&self, id: BackendId) -> Result<(), BackendError>;

    /// Stop a transfer and discard it.
    async fn cancel(&self, id: BackendId) -> Result<(), BackendError>;

    /// Reveal the downloaded file to the user (e.g. in a file manager).
    async fn show(&self, id: BackendId) -> Result<(), BackendError>;

    /// Current state of a transfer.
    async fn query(&self, id: BackendId) -> Result<BackendSnapshot, BackendError>;

    /// Subscribe to change notifications for all transfers.
    fn subscribe(&self) -> broadcast::Receiver<BackendChange>;
}
