//! Live batch progress for `bulkdl run`.
//!
//! One bar for the whole batch: its position is the mean progress of the
//! top-level items, its message the per-state counts.

use std::io::{self, IsTerminal};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use bulkdl_core::{BatchItem, SingleStatus};

/// Bar resolution: tenths of a percent.
const BAR_LENGTH: u64 = 1000;

/// Counts over the top-level items of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub downloading: usize,
    /// Mean progress of the top-level items, in percent.
    pub progress: f64,
}

impl Summary {
    /// Summarise a collection.
    ///
    /// Children of groups are not counted on their own; their group stands
    /// for them. Files currently transferring are counted individually.
    #[allow(clippy::cast_precision_loss)]
    pub fn of(items: &[BatchItem]) -> Self {
        let mut summary = Self::default();
        let mut progress_sum = 0.0;

        for item in items {
            if let BatchItem::Single(single) = item {
                if single.status == SingleStatus::Downloading {
                    summary.downloading += 1;
                }
                if single.parent_id.is_some() {
                    continue;
                }
            }
            summary.total += 1;
            progress_sum += item.progress();
            if item.is_completed() {
                summary.completed += 1;
            } else if item.is_failed() {
                summary.failed += 1;
            }
        }

        if summary.total > 0 {
            summary.progress = progress_sum / summary.total as f64;
        }
        summary
    }

    pub fn message(&self) -> String {
        format!(
            "{}/{} done, {} downloading, {} failed",
            self.completed, self.total, self.downloading, self.failed
        )
    }
}

/// Progress display for a running batch.
///
/// Draws an `indicatif` bar on a terminal; prints nothing otherwise until
/// [`finish`](Self::finish).
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new() -> Self {
        let target = if io::stderr().is_terminal() {
            ProgressDrawTarget::stderr()
        } else {
            ProgressDrawTarget::hidden()
        };
        let bar = ProgressBar::with_draw_target(Some(BAR_LENGTH), target);
        let style = ProgressStyle::with_template(
            "{spinner} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {percent:>3}% {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }

    /// Redraw from the current collection.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn update(&self, items: &[BatchItem]) -> Summary {
        let summary = Summary::of(items);
        let position = (summary.progress.clamp(0.0, 100.0) * 10.0).round() as u64;
        self.bar.set_position(position.min(BAR_LENGTH));
        self.bar.set_message(summary.message());
        summary
    }

    /// Clear the bar and print the final counts.
    pub fn finish(&self, summary: &Summary) {
        self.bar.finish_and_clear();
        println!("{}", summary.message());
    }
}

impl Default for BatchProgress {
    fn default() -> Self {
        Self::new()
    }
}
