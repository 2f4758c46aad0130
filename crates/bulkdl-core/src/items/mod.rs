//! The batch item collection model.
//!
//! A batch is an ordered list of [`BatchItem`]s. Every item is one of three
//! shapes:
//!
//! - [`PendingItem`] - a user selection that has not been resolved yet
//! - [`SingleItem`] - one downloadable file (optionally the child of a group)
//! - [`MultipleItem`] - a group whose progress is derived from its children
//!
//! The collection is always mutated as a whole (read, transform, write); the
//! helpers here only inspect or patch individual items.

mod ids;

use serde::{Deserialize, Serialize};

pub use ids::{BackendId, ItemId};

/// Status of an unresolved selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    /// Waiting to be picked up by the resolve phase.
    Pending,
    /// Accepted but not yet eligible for resolution.
    Queued,
    /// A resolver call is in flight.
    Resolving,
    /// Resolution failed, timed out or returned no files.
    Failed,
}

/// Status of a single downloadable file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleStatus {
    /// Resolved and waiting for a dispatch slot.
    Resolved,
    /// Dispatch in progress (backend start call in flight).
    Queued,
    /// Transferring bytes.
    Downloading,
    /// Paused by the operator; still occupies a dispatch slot.
    Paused,
    /// Transfer finished.
    Completed,
    /// Backend start failed or the transfer was interrupted.
    Failed,
}

impl SingleStatus {
    /// Whether this status occupies one of the concurrency slots.
    pub const fn occupies_slot(self) -> bool {
        matches!(self, Self::Downloading | Self::Paused)
    }

    /// Whether no further transitions happen without operator action.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Status of a group of files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MultipleStatus {
    /// Children exist and at least one is not completed.
    Resolved,
    /// Reserved for groups whose children are waiting for dispatch.
    Queued,
    /// Every child is completed.
    Completed,
    /// The group failed as a whole.
    Failed,
}

/// The enqueue input: something the user picked that should be downloaded.
///
/// Also the element type of the transient incoming buffer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedItem {
    /// Natural key of the selection (usually the source URL).
    pub id: ItemId,
    /// Human-readable title.
    pub title: String,
    /// URL handed to the resolver.
    pub source_url: String,
}

impl SelectedItem {
    /// Create a new selection.
    pub fn new(id: impl Into<ItemId>, title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source_url: source_url.into(),
        }
    }

    /// Create a selection keyed by its own source URL.
    pub fn from_url(source_url: impl Into<String>, title: impl Into<String>) -> Self {
        let source_url = source_url.into();
        Self {
            id: ItemId::new(source_url.clone()),
            title: title.into(),
            source_url,
        }
    }
}

/// An unresolved selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    pub id: ItemId,
    pub title: String,
    pub source_url: String,
    pub status: PendingStatus,
    /// Reason of the last failure, cleared on retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PendingItem {
    /// Turn a selection into a fresh pending item.
    pub fn from_selection(selection: SelectedItem) -> Self {
        Self {
            id: selection.id,
            title: selection.title,
            source_url: selection.source_url,
            status: PendingStatus::Pending,
            error: None,
        }
    }
}

/// The file half of a [`SingleItem`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileRef {
    pub url: String,
    /// Backend transfer id, present once dispatched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_id: Option<BackendId>,
    /// Percentage in `[0, 100]`.
    pub progress: f64,
}

impl FileRef {
    /// A file that has not been dispatched yet.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backend_id: None,
            progress: 0.0,
        }
    }
}

/// One downloadable file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SingleItem {
    pub id: ItemId,
    pub title: String,
    pub status: SingleStatus,
    pub file: FileRef,
    /// Set iff this file is a child of a [`MultipleItem`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ItemId>,
    /// Reason of the last failure, cleared on retry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SingleItem {
    /// A freshly resolved file.
    pub fn resolved(id: ItemId, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            status: SingleStatus::Resolved,
            file: FileRef::new(url),
            parent_id: None,
            error: None,
        }
    }

    /// Attach this file to a parent group.
    #[must_use]
    pub fn with_parent(mut self, parent: ItemId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Mark the file failed with a reason.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = SingleStatus::Failed;
        self.error = Some(error.into());
    }
}

/// A group of files produced by one selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MultipleItem {
    pub id: ItemId,
    pub title: String,
    pub status: MultipleStatus,
    /// Derived from children; never set independently.
    pub progress: f64,
    /// Ordered child ids.
    pub children: Vec<ItemId>,
}

/// One entry of the batch collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchItem {
    Pending(PendingItem),
    Single(SingleItem),
    Multiple(MultipleItem),
}

impl BatchItem {
    /// The item's id, whatever its shape.
    pub const fn id(&self) -> &ItemId {
        match self {
            Self::Pending(item) => &item.id,
            Self::Single(item) => &item.id,
            Self::Multiple(item) => &item.id,
        }
    }

    /// The item's title, whatever its shape.
    pub fn title(&self) -> &str {
        match self {
            Self::Pending(item) => &item.title,
            Self::Single(item) => &item.title,
            Self::Multiple(item) => &item.title,
        }
    }

    /// Whether the item still has work ahead of it.
    ///
    /// Pending is active unless failed; single is active unless completed or
    /// failed; multiple is active unless completed.
    pub const fn is_active(&self) -> bool {
        match self {
            Self::Pending(item) => !matches!(item.status, PendingStatus::Failed),
            Self::Single(item) => !item.status.is_terminal(),
            Self::Multiple(item) => !matches!(item.status, MultipleStatus::Completed),
        }
    }

    /// Whether the item is in its failed state.
    pub const fn is_failed(&self) -> bool {
        match self {
            Self::Pending(item) => matches!(item.status, PendingStatus::Failed),
            Self::Single(item) => matches!(item.status, SingleStatus::Failed),
            Self::Multiple(item) => matches!(item.status, MultipleStatus::Failed),
        }
    }

    /// Whether the item is in its completed state.
    pub const fn is_completed(&self) -> bool {
        match self {
            Self::Pending(_) => false,
            Self::Single(item) => matches!(item.status, SingleStatus::Completed),
            Self::Multiple(item) => matches!(item.status, MultipleStatus::Completed),
        }
    }

    /// Progress shown to the user, in `[0, 100]`.
    pub const fn progress(&self) -> f64 {
        match self {
            Self::Pending(_) => 0.0,
            Self::Single(item) => item.file.progress,
            Self::Multiple(item) => item.progress,
        }
    }

    pub const fn as_single(&self) -> Option<&SingleItem> {
        match self {
            Self::Single(item) => Some(item),
            _ => None,
        }
    }

    pub const fn as_single_mut(&mut self) -> Option<&mut SingleItem> {
        match self {
            Self::Single(item) => Some(item),
            _ => None,
        }
    }

    pub const fn as_pending(&self) -> Option<&PendingItem> {
        match self {
            Self::Pending(item) => Some(item),
            _ => None,
        }
    }

    pub const fn as_multiple(&self) -> Option<&MultipleItem> {
        match self {
            Self::Multiple(item) => Some(item),
            _ => None,
        }
    }

    /// Short lowercase status label for logs and listings.
    pub const fn status_label(&self) -> &'static str {
        match self {
            Self::Pending(item) => match item.status {
                PendingStatus::Pending => "pending",
                PendingStatus::Queued => "queued",
                PendingStatus::Resolving => "resolving",
                PendingStatus::Failed => "failed",
            },
            Self::Single(item) => match item.status {
                SingleStatus::Resolved => "resolved",
                SingleStatus::Queued => "queued",
                SingleStatus::Downloading => "downloading",
                SingleStatus::Paused => "paused",
                SingleStatus::Completed => "completed",
                SingleStatus::Failed => "failed",
            },
            Self::Multiple(item) => match item.status {
                MultipleStatus::Resolved => "resolved",
                MultipleStatus::Queued => "queued",
                MultipleStatus::Completed => "completed",
                MultipleStatus::Failed => "failed",
            },
        }
    }
}

impl From<PendingItem> for BatchItem {
    fn from(item: PendingItem) -> Self {
        Self::Pending(item)
    }
}

impl From<SingleItem> for BatchItem {
    fn from(item: SingleItem) -> Self {
        Self::Single(item)
    }
}

impl From<MultipleItem> for BatchItem {
    fn from(item: MultipleItem) -> Self {
        Self::Multiple(item)
    }
}

/// Find an item by id.
pub fn find<'a>(items: &'a [BatchItem], id: &ItemId) -> Option<&'a BatchItem> {
    items.iter().find(|item| item.id() == id)
}

/// Find the single whose transfer has the given backend id.
pub fn find_by_backend_id_mut(items: &mut [BatchItem], backend_id: BackendId) -> Option<&mut SingleItem> {
    items
        .iter_mut()
        .filter_map(BatchItem::as_single_mut)
        .find(|single| single.file.backend_id == Some(backend_id))
}

/// Whether any item in the collection is active.
pub fn any_active(items: &[BatchItem]) -> bool {
    items.iter().any(BatchItem::is_active)
}

/// Number of singles occupying a concurrency slot (downloading or paused).
pub fn occupied_slots(items: &[BatchItem]) -> usize {
    items
        .iter()
        .filter_map(BatchItem::as_single)
        .filter(|single| single.status.occupies_slot())
        .count()
}
