//! Operator actions on the collection.
//!
//! Each transition returns the backend ids the caller has to pause, resume or
//! cancel once the new collection is persisted.

use std::collections::HashSet;

use bulkdl_core::{
    BackendId, BatchError, BatchItem, ItemId, MultipleStatus, PendingStatus, SingleItem,
    SingleStatus,
};

use super::Batch;

impl Batch {
    /// Reset one failed item.
    ///
    /// On a group this resets its failed children (and the group itself if
    /// it was marked failed). Items that are not failed are left alone.
    /// Returns the number of items reset.
    pub fn retry(&mut self, id: &ItemId) -> Result<usize, BatchError> {
        let Some(item) = self.get(id) else {
            return Err(BatchError::not_found(id.clone()));
        };

        let targets: Vec<ItemId> = match item {
            BatchItem::Multiple(group) => {
                let mut targets = group.children.clone();
                targets.push(group.id.clone());
                targets
            }
            _ => vec![id.clone()],
        };

        Ok(self.reset_failed(|item| targets.contains(item.id())))
    }

    /// Reset every failed item. Returns the number of items reset.
    pub fn retry_all_failed(&mut self) -> usize {
        self.reset_failed(|_| true)
    }

    fn reset_failed(&mut self, mut selected: impl FnMut(&BatchItem) -> bool) -> usize {
        let mut reset = 0;
        for item in &mut self.items {
            if !item.is_failed() || !selected(item) {
                continue;
            }
            match item {
                BatchItem::Pending(p) => {
                    p.status = PendingStatus::Pending;
                    p.error = None;
                }
                BatchItem::Single(s) => reset_single(s),
                BatchItem::Multiple(group) => group.status = MultipleStatus::Resolved,
            }
            reset += 1;
        }
        reset
    }

    /// Pause every downloading single. Returns the transfers to pause.
    pub fn pause_all(&mut self) -> Vec<BackendId> {
        let mut to_pause = Vec::new();
        for single in self.items.iter_mut().filter_map(BatchItem::as_single_mut) {
            if single.status == SingleStatus::Downloading {
                single.status = SingleStatus::Paused;
                to_pause.extend(single.file.backend_id);
            }
        }
        to_pause
    }

    /// Resume every paused single. Returns the transfers to resume.
    ///
    /// A paused single without a transfer goes back to resolved and will be
    /// dispatched again. The concurrency limit is not re-checked here.
    pub fn resume_all(&mut self) -> Vec<BackendId> {
        let mut to_resume = Vec::new();
        for single in self.items.iter_mut().filter_map(BatchItem::as_single_mut) {
            if single.status != SingleStatus::Paused {
                continue;
            }
            if let Some(backend_id) = single.file.backend_id {
                single.status = SingleStatus::Downloading;
                to_resume.push(backend_id);
            } else {
                single.status = SingleStatus::Resolved;
            }
        }
        to_resume
    }

    /// Remove one item with its cascade. Returns the transfers to cancel.
    pub fn remove(&mut self, id: &ItemId) -> Result<Vec<BackendId>, BatchError> {
        if !self.contains(id) {
            return Err(BatchError::not_found(id.clone()));
        }
        Ok(self.remove_cascade(&[id.clone()]))
    }

    /// Remove every completed item with its cascade. Returns the transfers
    /// to cancel.
    pub fn clear_completed(&mut self) -> Vec<BackendId> {
        let completed: Vec<ItemId> = self
            .items
            .iter()
            .filter(|item| item.is_completed())
            .map(|item| item.id().clone())
            .collect();
        self.remove_cascade(&completed)
    }

    /// Empty the collection. Returns every transfer to cancel.
    pub fn clear_all(&mut self) -> Vec<BackendId> {
        let to_cancel = self
            .items
            .iter()
            .filter_map(BatchItem::as_single)
            .filter_map(|s| s.file.backend_id)
            .collect();
        self.items.clear();
        to_cancel
    }

    /// Remove `roots` and everything their removal implies.
    ///
    /// A group takes all its children along; a child shrinks its group, and
    /// a group left without children is removed as well.
    fn remove_cascade(&mut self, roots: &[ItemId]) -> Vec<BackendId> {
        let mut doomed: HashSet<ItemId> = HashSet::new();

        for id in roots {
            match self.get(id) {
                Some(BatchItem::Multiple(group)) => {
                    doomed.extend(group.children.iter().cloned());
                    doomed.insert(group.id.clone());
                }
                Some(_) => {
                    doomed.insert(id.clone());
                }
                None => {}
            }
        }

        let mut emptied = Vec::new();
        for item in &mut self.items {
            if let BatchItem::Multiple(group) = item {
                if doomed.contains(&group.id) {
                    continue;
                }
                let before = group.children.len();
                group.children.retain(|child| !doomed.contains(child));
                if before > 0 && group.children.is_empty() {
                    emptied.push(group.id.clone());
                }
            }
        }
        doomed.extend(emptied);

        let mut to_cancel = Vec::new();
        self.items.retain(|item| {
            if !doomed.contains(item.id()) {
                return true;
            }
            if let BatchItem::Single(single) = item {
                to_cancel.extend(single.file.backend_id);
            }
            false
        });
        to_cancel
    }
}

fn reset_single(single: &mut SingleItem) {
    single.status = SingleStatus::Resolved;
    single.file.progress = 0.0;
    single.file.backend_id = None;
    single.error = None;
}
