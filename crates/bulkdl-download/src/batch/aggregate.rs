//! Derived state of multi-file groups.
//!
//! A group's progress and completion are never stored independently; they
//! are recomputed from the children after every mutation. A group completes
//! only when every child has completed.

use std::collections::HashMap;

use bulkdl_core::{BatchItem, ItemId, MultipleStatus, SingleStatus};

/// Recompute progress and status of every group from its children.
///
/// For a group with `n` existing children of which `c` are completed:
/// `progress = 100 * c / n`, and the group is completed iff `n > 0 && c == n`.
/// A completed group that no longer qualifies falls back to resolved. Failed
/// children never fail the group. Child ids that no longer exist are skipped;
/// groups without any existing child are left untouched.
///
/// Returns whether anything changed.
#[allow(clippy::cast_precision_loss)]
pub fn recompute_parents(items: &mut [BatchItem]) -> bool {
    let child_status: HashMap<ItemId, SingleStatus> = items
        .iter()
        .filter_map(BatchItem::as_single)
        .filter(|single| single.parent_id.is_some())
        .map(|single| (single.id.clone(), single.status))
        .collect();

    let mut changed = false;

    for item in items.iter_mut() {
        let BatchItem::Multiple(group) = item else {
            continue;
        };

        let statuses: Vec<SingleStatus> = group
            .children
            .iter()
            .filter_map(|id| child_status.get(id).copied())
            .collect();

        let total = statuses.len();
        if total == 0 {
            continue;
        }
        let completed = statuses
            .iter()
            .filter(|status| matches!(status, SingleStatus::Completed))
            .count();

        let progress = (completed as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
        let status = if completed == total {
            MultipleStatus::Completed
        } else if group.status == MultipleStatus::Completed {
            MultipleStatus::Resolved
        } else {
            group.status
        };

        if (group.progress - progress).abs() > f64::EPSILON || group.status != status {
            group.progress = progress;
            group.status = status;
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkdl_core::{MultipleItem, SingleItem};

    fn group(id: &str, children: &[&str]) -> BatchItem {
        BatchItem::Multiple(MultipleItem {
            id: ItemId::new(id),
            title: id.to_string(),
            status: MultipleStatus::Resolved,
            progress: 0.0,
            children: children.iter().map(|c| ItemId::new(*c)).collect(),
        })
    }

    fn child(id: &str, parent: &str, status: SingleStatus) -> BatchItem {
        let mut single = SingleItem::resolved(ItemId::new(id), id, format!("https://example.com/{id}"))
            .with_parent(ItemId::new(parent));
        single.status = status;
        BatchItem::Single(single)
    }

    fn group_state(items: &[BatchItem]) -> (MultipleStatus, f64) {
        let group = items[0].as_multiple().unwrap();
        (group.status, group.progress)
    }

    #[test]
    fn test_progress_is_completed_fraction() {
        let mut items = vec![
            group("g", &["a", "b", "c", "d"]),
            child("a", "g", SingleStatus::Completed),
            child("b", "g", SingleStatus::Downloading),
            child("c", "g", SingleStatus::Failed),
            child("d", "g", SingleStatus::Resolved),
        ];

        assert!(recompute_parents(&mut items));
        assert_eq!(group_state(&items), (MultipleStatus::Resolved, 25.0));
    }

    #[test]
    fn test_completed_iff_all_children_completed() {
        let mut items = vec![
            group("g", &["a", "b"]),
            child("a", "g", SingleStatus::Completed),
            child("b", "g", SingleStatus::Completed),
        ];

        recompute_parents(&mut items);
        assert_eq!(group_state(&items), (MultipleStatus::Completed, 100.0));

        // A retried child pulls the group back out of completion.
        if let Some(single) = items[2].as_single_mut() {
            single.status = SingleStatus::Resolved;
        }
        recompute_parents(&mut items);
        assert_eq!(group_state(&items), (MultipleStatus::Resolved, 50.0));
    }

    #[test]
    fn test_failed_child_holds_group_below_completion() {
        let mut items = vec![
            group("g", &["a", "b", "c"]),
            child("a", "g", SingleStatus::Completed),
            child("b", "g", SingleStatus::Completed),
            child("c", "g", SingleStatus::Failed),
        ];

        recompute_parents(&mut items);
        let (status, progress) = group_state(&items);
        assert_eq!(status, MultipleStatus::Resolved);
        assert!((progress - 200.0 / 3.0).abs() < 1e-9);
        assert!(items[0].is_active());
    }

    #[test]
    fn test_failed_children_never_fail_the_group() {
        let mut items = vec![
            group("g", &["a", "b"]),
            child("a", "g", SingleStatus::Failed),
            child("b", "g", SingleStatus::Failed),
        ];

        recompute_parents(&mut items);
        assert_eq!(group_state(&items), (MultipleStatus::Resolved, 0.0));
        assert!(items[0].is_active());
    }

    #[test]
    fn test_missing_children_are_skipped() {
        let mut items = vec![group("g", &["a", "gone"]), child("a", "g", SingleStatus::Completed)];

        recompute_parents(&mut items);
        assert_eq!(group_state(&items), (MultipleStatus::Completed, 100.0));
    }

    #[test]
    fn test_idempotent() {
        let mut items = vec![
            group("g", &["a", "b"]),
            child("a", "g", SingleStatus::Completed),
            child("b", "g", SingleStatus::Downloading),
        ];

        assert!(recompute_parents(&mut items));
        let snapshot = items.clone();
        assert!(!recompute_parents(&mut items));
        assert_eq!(items, snapshot);
    }
}
