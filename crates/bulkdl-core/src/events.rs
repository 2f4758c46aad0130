//! Batch events emitted to UI collaborators.
//!
//! Events are fire-and-forget notifications; the persisted collection stays
//! the source of truth. A UI that misses events can always ask the manager
//! for `items()`.

use serde::{Deserialize, Serialize};

use crate::items::{BatchItem, ItemId};

/// An event describing a change in the batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BatchEvent {
    /// Full collection after a tick.
    Snapshot { items: Vec<BatchItem> },

    /// A pending item was resolved into `files` downloadable files.
    ItemResolved { id: ItemId, files: usize },

    /// An item moved to Failed.
    ItemFailed { id: ItemId, error: String },

    /// A single download completed.
    ItemCompleted { id: ItemId },

    /// The batch switched between busy and idle.
    BusyChanged { busy: bool },
}

impl BatchEvent {
    /// Create a failure event.
    pub fn failed(id: ItemId, error: impl Into<String>) -> Self {
        Self::ItemFailed {
            id,
            error: error.into(),
        }
    }

    /// Short event name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::ItemResolved { .. } => "item_resolved",
            Self::ItemFailed { .. } => "item_failed",
            Self::ItemCompleted { .. } => "item_completed",
            Self::BusyChanged { .. } => "busy_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag() {
        let event = BatchEvent::BusyChanged { busy: true };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "busy_changed");
        assert_eq!(json["busy"], true);
        assert_eq!(event.name(), "busy_changed");
    }
}
