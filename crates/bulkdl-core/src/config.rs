//! Scheduler and tracker configuration.

use std::time::Duration;

/// Default maximum number of simultaneously active backend downloads.
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 3;
/// Default number of pending items resolved per tick.
pub const DEFAULT_RESOLVE_PER_TICK: usize = 3;
/// Default interval between two polls of the backend.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Default number of downloads queried per poll.
pub const DEFAULT_POLL_BATCH_SIZE: usize = 10;
/// Default minimum interval between two queries for one backend id.
pub const DEFAULT_QUERY_THROTTLE: Duration = Duration::from_millis(250);
/// Default minimum progress change (percentage points) worth persisting.
pub const DEFAULT_PROGRESS_WRITE_THRESHOLD: f64 = 0.5;
/// Default upper bound for one resolver call.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(15);

/// Configuration for the batch manager.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    /// Maximum simultaneously active (downloading or paused) downloads.
    pub concurrency_limit: usize,
    /// Pending items resolved per tick.
    pub resolve_per_tick: usize,
    /// Interval of the progress poller.
    pub poll_interval: Duration,
    /// Downloads queried per poll, round-robin across polls.
    pub poll_batch_size: usize,
    /// Minimum interval between event-driven queries for one download.
    pub query_throttle: Duration,
    /// Minimum progress change in percentage points before a write.
    pub progress_write_threshold: f64,
    /// Upper bound for one resolver call.
    pub resolve_timeout: Duration,
    /// Format preference handed to the resolver (adapter-defined).
    pub format_preference: String,
    /// Whether actions and events schedule ticks on their own.
    ///
    /// Short-lived front ends that only edit the collection turn this off
    /// so no download is dispatched from their process.
    pub auto_tick: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            resolve_per_tick: DEFAULT_RESOLVE_PER_TICK,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_batch_size: DEFAULT_POLL_BATCH_SIZE,
            query_throttle: DEFAULT_QUERY_THROTTLE,
            progress_write_threshold: DEFAULT_PROGRESS_WRITE_THRESHOLD,
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
            format_preference: "best".to_string(),
            auto_tick: true,
        }
    }
}

impl BatchConfig {
    /// Set the concurrency limit. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    /// Set how many pending items are resolved per tick.
    #[must_use]
    pub fn with_resolve_per_tick(mut self, n: usize) -> Self {
        self.resolve_per_tick = n.max(1);
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_poll_batch_size(mut self, n: usize) -> Self {
        self.poll_batch_size = n.max(1);
        self
    }

    #[must_use]
    pub const fn with_query_throttle(mut self, interval: Duration) -> Self {
        self.query_throttle = interval;
        self
    }

    #[must_use]
    pub const fn with_progress_write_threshold(mut self, threshold: f64) -> Self {
        self.progress_write_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    /// Set the format preference forwarded to the resolver.
    #[must_use]
    pub fn with_format_preference(mut self, format: impl Into<String>) -> Self {
        self.format_preference = format.into();
        self
    }

    /// Enable or disable automatic tick scheduling.
    #[must_use]
    pub const fn with_auto_tick(mut self, enabled: bool) -> Self {
        self.auto_tick = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchConfig::default();
        assert_eq!(config.concurrency_limit, 3);
        assert_eq!(config.resolve_per_tick, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.resolve_timeout, Duration::from_secs(15));
        assert!(config.auto_tick);
    }

    #[test]
    fn test_builders_clamp_to_one() {
        let config = BatchConfig::default()
            .with_concurrency_limit(0)
            .with_poll_batch_size(0)
            .with_auto_tick(false);
        assert_eq!(config.concurrency_limit, 1);
        assert_eq!(config.poll_batch_size, 1);
        assert!(!config.auto_tick);
    }
}
