//! Common test utilities.
//!
//! Provides in-process fakes for every port the batch manager consumes and a
//! harness that wires them together.

#![allow(dead_code)]

pub mod fakes;

use std::sync::Arc;
use std::time::Duration;

use bulkdl_core::{
    BatchConfig, BatchItem, ItemId, KeyValueStore, MemoryKeyValueStore, SelectedItem,
};
use bulkdl_download::{BatchManager, BatchManagerDeps, build_batch_manager};

use fakes::{FakeBackend, FakeResolver, FlakyStore, RecordingBusySignal, RecordingEmitter};

/// A manager wired to fakes, with handles on every fake.
pub struct Harness {
    pub manager: Arc<BatchManager>,
    pub backend: Arc<FakeBackend>,
    pub resolver: Arc<FakeResolver>,
    pub events: Arc<RecordingEmitter>,
    pub busy: Arc<RecordingBusySignal>,
    pub kv: Arc<MemoryKeyValueStore>,
}

impl Harness {
    /// Build a harness over a fresh in-memory store.
    pub fn new(config: BatchConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryKeyValueStore::new()), Arc::new(FakeBackend::new()))
    }

    /// Build a harness over an existing store and backend, as a restarted
    /// process would see them.
    pub fn with_store(
        config: BatchConfig,
        kv: Arc<MemoryKeyValueStore>,
        backend: Arc<FakeBackend>,
    ) -> Self {
        Self::build(config, kv.clone(), kv, backend)
    }

    /// Build a harness whose store writes can be made to fail.
    pub fn with_flaky_store(config: BatchConfig) -> (Self, Arc<FlakyStore>) {
        let kv = Arc::new(MemoryKeyValueStore::new());
        let flaky = Arc::new(FlakyStore::new(kv.clone()));
        let harness = Self::build(config, flaky.clone(), kv, Arc::new(FakeBackend::new()));
        (harness, flaky)
    }

    fn build(
        config: BatchConfig,
        store: Arc<dyn KeyValueStore>,
        kv: Arc<MemoryKeyValueStore>,
        backend: Arc<FakeBackend>,
    ) -> Self {
        let resolver = Arc::new(FakeResolver::new());
        let events = Arc::new(RecordingEmitter::default());
        let busy = Arc::new(RecordingBusySignal::default());

        let manager = build_batch_manager(BatchManagerDeps {
            store,
            resolver: resolver.clone(),
            backend: backend.clone(),
            busy_signal: busy.clone(),
            event_emitter: events.clone(),
            config,
        });

        Self {
            manager,
            backend,
            resolver,
            events,
            busy,
            kv,
        }
    }

    /// Current collection.
    pub async fn items(&self) -> Vec<BatchItem> {
        use bulkdl_core::BatchManagerPort;
        self.manager.items().await.unwrap()
    }

    /// The item with this id.
    pub async fn item(&self, id: &str) -> BatchItem {
        let id = ItemId::new(id);
        self.items()
            .await
            .into_iter()
            .find(|item| item.id() == &id)
            .unwrap_or_else(|| panic!("no item {id}"))
    }

    /// Number of singles currently downloading.
    pub async fn downloading(&self) -> usize {
        self.items()
            .await
            .iter()
            .filter_map(BatchItem::as_single)
            .filter(|s| s.status == bulkdl_core::SingleStatus::Downloading)
            .count()
    }
}

/// Configuration for tests that drive ticks and polls by hand.
pub fn manual_config() -> BatchConfig {
    BatchConfig::default()
        .with_auto_tick(false)
        .with_poll_interval(Duration::from_secs(3600))
}

/// A selection keyed by its URL.
pub fn selection(url: &str) -> SelectedItem {
    SelectedItem::from_url(url, url.rsplit('/').next().unwrap_or(url))
}

/// Poll `condition` until it holds, failing after five (virtual or real)
/// seconds.
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition().await {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
