//! Batch collection state machine.
//!
//! This module provides a pure state machine over the persisted item
//! collection. No I/O is performed here; the manager loads a [`Batch`],
//! applies one of these transitions and writes it back.
//!
//! # Design
//!
//! - Pure synchronous transitions (no async, no IO, no tracing)
//! - Transitions that require backend calls return the backend ids to act on
//! - Deterministic: same inputs always produce same outputs
//! - List order is significant: resolution and dispatch go front to back

mod actions;
mod aggregate;
mod observe;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use bulkdl_core::{
    BackendId, BatchItem, FileDescriptor, ItemId, MultipleItem, MultipleStatus, PendingItem,
    PendingStatus, SelectedItem, SingleItem, SingleStatus,
};

pub use aggregate::recompute_parents;
pub use observe::{Observation, ObservationOutcome};

/// Outcome of applying a resolver result to a pending item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The item disappeared while the resolver was running.
    Vanished,
    /// No files: the item is now failed.
    Failed,
    /// One file: the item is now a single.
    Single,
    /// Several files: the item is now a group with these children.
    Multiple(Vec<ItemId>),
}

/// The ordered item collection.
///
/// This is a sync type with no internal locking; the item store is
/// responsible for serialising read-modify-write cycles.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    items: Vec<BatchItem>,
}

impl Batch {
    /// Create an empty batch.
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub const fn from_items(items: Vec<BatchItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[BatchItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<BatchItem> {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &ItemId) -> Option<&BatchItem> {
        self.items.iter().find(|item| item.id() == id)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    fn position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == id)
    }

    fn single_mut(&mut self, id: &ItemId) -> Option<&mut SingleItem> {
        self.items
            .iter_mut()
            .filter_map(BatchItem::as_single_mut)
            .find(|single| &single.id == id)
    }

    fn singles(&self) -> impl Iterator<Item = &SingleItem> {
        self.items.iter().filter_map(BatchItem::as_single)
    }

    /// Whether any item still has work ahead of it.
    pub fn any_active(&self) -> bool {
        self.items.iter().any(BatchItem::is_active)
    }

    /// Number of singles holding a concurrency slot (downloading or paused).
    pub fn occupied_slots(&self) -> usize {
        self.singles().filter(|s| s.status.occupies_slot()).count()
    }

    /// Whether anything is waiting to be resolved or dispatched.
    pub fn has_unstarted_work(&self) -> bool {
        self.items.iter().any(|item| match item {
            BatchItem::Pending(p) => p.status == PendingStatus::Pending,
            BatchItem::Single(s) => s.status == SingleStatus::Resolved,
            BatchItem::Multiple(_) => false,
        })
    }

    /// Backend ids of every transfer the tracker should observe.
    pub fn transfer_ids(&self) -> Vec<BackendId> {
        self.transfers().into_iter().map(|(_, id)| id).collect()
    }

    /// Singles that are downloading or paused, with their backend ids.
    pub fn transfers(&self) -> Vec<(ItemId, BackendId)> {
        self.singles()
            .filter(|s| s.status.occupies_slot())
            .filter_map(|s| s.file.backend_id.map(|bid| (s.id.clone(), bid)))
            .collect()
    }

    /// Run the aggregator over this collection.
    pub fn recompute_parents(&mut self) -> bool {
        recompute_parents(&mut self.items)
    }

    // ------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------

    /// Append every selection whose id is not in the collection yet.
    ///
    /// Returns the number of items added.
    pub fn merge_incoming(&mut self, incoming: Vec<SelectedItem>) -> usize {
        let mut added = 0;
        for selection in incoming {
            if self.contains(&selection.id) {
                continue;
            }
            self.items
                .push(BatchItem::Pending(PendingItem::from_selection(selection)));
            added += 1;
        }
        added
    }

    // ------------------------------------------------------------------
    // Resolve
    // ------------------------------------------------------------------

    /// The first `limit` pending items waiting for resolution, in list order.
    pub fn pending_for_resolution(&self, limit: usize) -> Vec<(ItemId, String)> {
        self.items
            .iter()
            .filter_map(BatchItem::as_pending)
            .filter(|p| p.status == PendingStatus::Pending)
            .take(limit)
            .map(|p| (p.id.clone(), p.source_url.clone()))
            .collect()
    }

    /// Mark a pending item as being resolved. Returns false if it is gone or
    /// no longer waiting.
    pub fn mark_resolving(&mut self, id: &ItemId) -> bool {
        for item in &mut self.items {
            if let BatchItem::Pending(p) = item {
                if &p.id == id && p.status == PendingStatus::Pending {
                    p.status = PendingStatus::Resolving;
                    return true;
                }
            }
        }
        false
    }

    /// Mark a pending item as failed.
    pub fn fail_pending(&mut self, id: &ItemId, error: &str) -> bool {
        for item in &mut self.items {
            if let BatchItem::Pending(p) = item {
                if &p.id == id {
                    p.status = PendingStatus::Failed;
                    p.error = Some(error.to_string());
                    return true;
                }
            }
        }
        false
    }

    /// Replace a pending item with the files the resolver found.
    ///
    /// One file replaces the item in place with a single; several replace it
    /// in place with a group and append one child per file.
    pub fn apply_resolution(
        &mut self,
        id: &ItemId,
        files: Vec<FileDescriptor>,
    ) -> ResolutionOutcome {
        let Some(index) = self.position(id) else {
            return ResolutionOutcome::Vanished;
        };
        let BatchItem::Pending(pending) = &self.items[index] else {
            return ResolutionOutcome::Vanished;
        };
        let pending = pending.clone();

        match files.len() {
            0 => {
                self.fail_pending(id, "no downloadable files found");
                ResolutionOutcome::Failed
            }
            1 => {
                let url = files.into_iter().next().map(|f| f.url).unwrap_or_default();
                self.items[index] =
                    BatchItem::Single(SingleItem::resolved(pending.id, pending.title, url));
                ResolutionOutcome::Single
            }
            _ => {
                let mut taken: HashSet<ItemId> =
                    self.items.iter().map(|item| item.id().clone()).collect();
                let mut children = Vec::with_capacity(files.len());
                let mut singles = Vec::with_capacity(files.len());

                for file in files {
                    let child_id = unique_child_id(&pending.id, &file.id, &taken);
                    taken.insert(child_id.clone());
                    let title = if file.title.is_empty() {
                        pending.title.clone()
                    } else {
                        file.title
                    };
                    children.push(child_id.clone());
                    singles.push(BatchItem::Single(
                        SingleItem::resolved(child_id, title, file.url).with_parent(pending.id.clone()),
                    ));
                }

                self.items[index] = BatchItem::Multiple(MultipleItem {
                    id: pending.id,
                    title: pending.title,
                    status: MultipleStatus::Resolved,
                    progress: 0.0,
                    children: children.clone(),
                });
                self.items.extend(singles);
                ResolutionOutcome::Multiple(children)
            }
        }
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Take the next resolved single (list order) and mark it queued.
    ///
    /// Returns its id and URL.
    pub fn queue_next_resolved(&mut self) -> Option<(ItemId, String)> {
        let single = self
            .items
            .iter_mut()
            .filter_map(BatchItem::as_single_mut)
            .find(|s| s.status == SingleStatus::Resolved)?;
        single.status = SingleStatus::Queued;
        Some((single.id.clone(), single.file.url.clone()))
    }

    /// Attach a started transfer. Returns false if the item was removed (or
    /// changed) while the backend call was in flight.
    pub fn mark_started(&mut self, id: &ItemId, backend_id: BackendId) -> bool {
        match self.single_mut(id) {
            Some(single) if single.status == SingleStatus::Queued => {
                single.status = SingleStatus::Downloading;
                single.file.backend_id = Some(backend_id);
                single.error = None;
                true
            }
            _ => false,
        }
    }

    /// Record a failed backend start.
    pub fn mark_start_failed(&mut self, id: &ItemId, error: &str) -> bool {
        match self.single_mut(id) {
            Some(single) if single.status == SingleStatus::Queued => {
                single.fail(error);
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------

    /// Reset states that only make sense while a tick is running.
    ///
    /// Resolving or queued pending items go back to pending; queued singles
    /// go back to resolved. Returns the number of items reset.
    pub fn reset_transitional(&mut self) -> usize {
        self.items.iter_mut().map(release).filter(|&reset| reset).count()
    }

    /// Reset one item left in a transitional state. Returns false if it is
    /// gone or settled.
    pub fn release_transitional(&mut self, id: &ItemId) -> bool {
        self.items
            .iter_mut()
            .find(|item| item.id() == id)
            .is_some_and(release)
    }

    /// Forget the transfers of these singles so they are dispatched again.
    pub fn reset_transfers(&mut self, ids: &[ItemId]) -> usize {
        let mut reset = 0;
        for id in ids {
            if let Some(single) = self.single_mut(id) {
                if single.status.occupies_slot() {
                    single.status = SingleStatus::Resolved;
                    single.file.backend_id = None;
                    single.file.progress = 0.0;
                    reset += 1;
                }
            }
        }
        reset
    }
}

fn release(item: &mut BatchItem) -> bool {
    match item {
        BatchItem::Pending(p)
            if matches!(p.status, PendingStatus::Resolving | PendingStatus::Queued) =>
        {
            p.status = PendingStatus::Pending;
            true
        }
        BatchItem::Single(s) if s.status == SingleStatus::Queued => {
            s.status = SingleStatus::Resolved;
            true
        }
        _ => false,
    }
}

/// Derive a child id not present in `taken`.
fn unique_child_id(parent: &ItemId, descriptor_id: &str, taken: &HashSet<ItemId>) -> ItemId {
    let base = ItemId::child_of(parent, descriptor_id);
    if !taken.contains(&base) {
        return base;
    }
    (2..)
        .map(|n| base.with_suffix(n))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or(base)
}
