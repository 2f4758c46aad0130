//! Per-transfer query throttling.
//!
//! Rate-limits backend queries triggered by change notifications so a chatty
//! backend cannot turn every received chunk into a query and a write.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;

use bulkdl_core::BackendId;

/// Rate-limiter keyed by backend id.
///
/// Each id may be queried at most once per `min_interval`.
pub struct QueryThrottle {
    last_query: HashMap<BackendId, Instant>,
    min_interval: Duration,
}

impl QueryThrottle {
    /// Create a new throttle with the specified minimum interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_query: HashMap::new(),
            min_interval,
        }
    }

    /// Check if enough time has passed to query `id` again.
    ///
    /// Records the query when it returns true.
    pub fn should_query(&mut self, id: BackendId) -> bool {
        let now = Instant::now();
        match self.last_query.get(&id) {
            Some(last) if now.duration_since(*last) < self.min_interval => false,
            _ => {
                self.last_query.insert(id, now);
                true
            }
        }
    }

    /// Drop the state of a transfer that ended or was cancelled.
    pub fn forget(&mut self, id: BackendId) {
        self.last_query.remove(&id);
    }

    /// Number of transfers currently tracked.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.last_query.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_throttle_first_query() {
        let mut throttle = QueryThrottle::new(Duration::from_millis(250));
        assert!(throttle.should_query(BackendId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_respects_interval_per_id() {
        let mut throttle = QueryThrottle::new(Duration::from_millis(250));
        assert!(throttle.should_query(BackendId(1)));
        assert!(!throttle.should_query(BackendId(1))); // Too soon
        assert!(throttle.should_query(BackendId(2))); // Other ids are independent

        tokio::time::advance(Duration::from_millis(260)).await;
        assert!(throttle.should_query(BackendId(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_forget() {
        let mut throttle = QueryThrottle::new(Duration::from_millis(250));
        throttle.should_query(BackendId(1));
        assert!(!throttle.should_query(BackendId(1)));

        throttle.forget(BackendId(1));
        assert_eq!(throttle.len(), 0);
        assert!(throttle.should_query(BackendId(1)));
    }
}
