//! Batch manager port.
//!
//! This is the operator-facing interface of the orchestrator. Every mutating
//! call persists its change before returning and schedules a tick.
//!
//! # Usage
//!
//! ```ignore
//! let manager: Arc<dyn BatchManagerPort> = /* ... */;
//!
//! manager.enqueue(vec![SelectedItem::from_url(url, "Episode 1")]).await?;
//! manager.pause_all().await?;
//! let items = manager.items().await?;
//! ```

use async_trait::async_trait;

use crate::errors::BatchResult;
use crate::items::{BatchItem, ItemId, SelectedItem};

#[async_trait]
pub trait BatchManagerPort: Send + Sync {
    /// Add selections to the incoming buffer, deduplicated by id.
    async fn enqueue(&self, items: Vec<SelectedItem>) -> BatchResult<()>;

    /// Reset one failed item so it is picked up again.
    async fn retry(&self, id: &ItemId) -> BatchResult<()>;

    /// Reset every failed item.
    async fn retry_all_failed(&self) -> BatchResult<()>;

    /// Pause every downloading file.
    async fn pause_all(&self) -> BatchResult<()>;

    /// Resume every paused file.
    async fn resume_all(&self) -> BatchResult<()>;

    /// Remove one item, cascading to its group or children.
    async fn remove(&self, id: &ItemId) -> BatchResult<()>;

    /// Cancel everything and empty the batch.
    async fn clear_all(&self) -> BatchResult<()>;

    /// Remove every completed item.
    async fn clear_completed(&self) -> BatchResult<()>;

    /// Reveal a downloaded file to the user.
    async fn show_in_folder(&self, id: &ItemId) -> BatchResult<()>;

    /// Current collection.
    async fn items(&self) -> BatchResult<Vec<BatchItem>>;
}
