//! In-process fakes for the batch manager's ports.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::{Notify, Semaphore, broadcast};

use bulkdl_core::{
    BackendChange, BackendError, BackendId, BackendSnapshot, BackendState, BatchEvent,
    BatchEventEmitterPort, BusySignalPort, DownloadBackendPort, FileDescriptor, KeyValueStore,
    MemoryKeyValueStore, RepositoryError, ResolveError, ResolverPort,
};
use serde_json::Value;

// =============================================================================
// Backend
// =============================================================================

/// A control call received by the fake backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Start(String),
    Pause(BackendId),
    Resume(BackendId),
    Cancel(BackendId),
    Show(BackendId),
}

#[derive(Debug, Clone, Copy)]
struct FakeTransfer {
    received: u64,
    total: Option<u64>,
    state: BackendState,
}

/// Backend whose transfers only move when the test says so.
pub struct FakeBackend {
    next_id: AtomicU64,
    transfers: Mutex<HashMap<BackendId, FakeTransfer>>,
    changes: broadcast::Sender<BackendChange>,
    calls: Mutex<Vec<Call>>,
    failing_urls: Mutex<HashSet<String>>,
    queries: AtomicUsize,
    /// When set, `start` waits for a permit before returning.
    start_gate: Mutex<Option<std::sync::Arc<Semaphore>>>,
    start_entered: Notify,
}

impl FakeBackend {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(256);
        Self {
            next_id: AtomicU64::new(1),
            transfers: Mutex::new(HashMap::new()),
            changes,
            calls: Mutex::new(Vec::new()),
            failing_urls: Mutex::new(HashSet::new()),
            queries: AtomicUsize::new(0),
            start_gate: Mutex::new(None),
            start_entered: Notify::new(),
        }
    }

    /// Make `start` fail for this URL.
    pub fn fail_start_for(&self, url: &str) {
        self.failing_urls.lock().unwrap().insert(url.to_string());
    }

    /// Hold every `start` call until permits are added to the returned gate.
    pub fn gate_starts(&self) -> std::sync::Arc<Semaphore> {
        let gate = std::sync::Arc::new(Semaphore::new(0));
        *self.start_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a `start` call is waiting on the gate.
    pub async fn start_entered(&self) {
        self.start_entered.notified().await;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn started(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, Call::Start(_)))
            .count()
    }

    pub fn cancelled(&self) -> Vec<BackendId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Cancel(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Set byte counters without notifying.
    pub fn set_progress(&self, id: BackendId, received: u64, total: Option<u64>) {
        if let Some(transfer) = self.transfers.lock().unwrap().get_mut(&id) {
            transfer.received = received;
            transfer.total = total;
        }
    }

    /// Set byte counters and notify subscribers.
    pub fn report_progress(&self, id: BackendId, received: u64, total: Option<u64>) {
        self.set_progress(id, received, total);
        let _ = self.changes.send(BackendChange::bytes(id, received, total));
    }

    /// Change a transfer's state and notify subscribers.
    pub fn set_state(&self, id: BackendId, state: BackendState) {
        if let Some(transfer) = self.transfers.lock().unwrap().get_mut(&id) {
            transfer.state = state;
            if state == BackendState::Complete {
                transfer.received = transfer.total.unwrap_or(transfer.received);
            }
        }
        let _ = self.changes.send(BackendChange::state(id, state));
    }

    pub fn complete(&self, id: BackendId) {
        self.set_state(id, BackendState::Complete);
    }

    pub fn interrupt(&self, id: BackendId) {
        self.set_state(id, BackendState::Interrupted);
    }

    /// Drop every transfer, as a restarted backend would.
    pub fn forget_all(&self) {
        self.transfers.lock().unwrap().clear();
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn known(&self, id: BackendId) -> Result<(), BackendError> {
        if self.transfers.lock().unwrap().contains_key(&id) {
            Ok(())
        } else {
            Err(BackendError::unknown(id))
        }
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DownloadBackendPort for FakeBackend {
    async fn start(&self, url: &str) -> Result<BackendId, BackendError> {
        self.record(Call::Start(url.to_string()));

        let gate = self.start_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.start_entered.notify_one();
            gate.acquire().await.unwrap().forget();
        }

        if self.failing_urls.lock().unwrap().contains(url) {
            return Err(BackendError::start("refused by fake backend"));
        }

        let id = BackendId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.transfers.lock().unwrap().insert(
            id,
            FakeTransfer {
                received: 0,
                total: Some(1000),
                state: BackendState::InProgress,
            },
        );
        Ok(id)
    }

    async fn pause(&self, id: BackendId) -> Result<(), BackendError> {
        self.record(Call::Pause(id));
        self.known(id)?;
        if let Some(transfer) = self.transfers.lock().unwrap().get_mut(&id) {
            transfer.state = BackendState::Paused;
        }
        Ok(())
    }

    async fn resume(&self, id: BackendId) -> Result<(), BackendError> {
        self.record(Call::Resume(id));
        self.known(id)?;
        if let Some(transfer) = self.transfers.lock().unwrap().get_mut(&id) {
            transfer.state = BackendState::InProgress;
        }
        Ok(())
    }

    async fn cancel(&self, id: BackendId) -> Result<(), BackendError> {
        self.record(Call::Cancel(id));
        self.transfers
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| BackendError::unknown(id))
    }

    async fn show(&self, id: BackendId) -> Result<(), BackendError> {
        self.record(Call::Show(id));
        self.known(id)
    }

    async fn query(&self, id: BackendId) -> Result<BackendSnapshot, BackendError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.transfers
            .lock()
            .unwrap()
            .get(&id)
            .map(|t| BackendSnapshot {
                received_bytes: t.received,
                total_bytes: t.total,
                state: t.state,
            })
            .ok_or_else(|| BackendError::unknown(id))
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendChange> {
        self.changes.subscribe()
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Memory store whose writes can be made to fail.
pub struct FlakyStore {
    inner: std::sync::Arc<MemoryKeyValueStore>,
    failing_sets: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: std::sync::Arc<MemoryKeyValueStore>) -> Self {
        Self {
            inner,
            failing_sets: AtomicUsize::new(0),
        }
    }

    /// Fail the next `n` `set` calls.
    pub fn fail_next_sets(&self, n: usize) {
        self.failing_sets.store(n, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, RepositoryError> {
        self.inner.get(keys).await
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), RepositoryError> {
        let failing = self
            .failing_sets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(RepositoryError::Storage("transient".to_string()));
        }
        self.inner.set(entries).await
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolver answering from a table; unknown URLs resolve to one file.
pub struct FakeResolver {
    answers: Mutex<HashMap<String, Result<Vec<FileDescriptor>, ResolveError>>>,
    calls: AtomicUsize,
    gate: Mutex<Option<std::sync::Arc<Semaphore>>>,
    entered: Notify,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            answers: Mutex::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
            entered: Notify::new(),
        }
    }

    /// Resolve `source_url` into `n` files.
    pub fn answer_files(&self, source_url: &str, n: usize) {
        let files = (1..=n)
            .map(|i| {
                FileDescriptor::new(
                    format!("part{i}"),
                    format!("Part {i}"),
                    format!("{source_url}/part{i}.bin"),
                )
            })
            .collect();
        self.answers
            .lock()
            .unwrap()
            .insert(source_url.to_string(), Ok(files));
    }

    /// Fail resolution of `source_url`.
    pub fn answer_error(&self, source_url: &str, error: ResolveError) {
        self.answers
            .lock()
            .unwrap()
            .insert(source_url.to_string(), Err(error));
    }

    /// Hold every call until permits are added to the returned gate.
    pub fn gate(&self) -> std::sync::Arc<Semaphore> {
        let gate = std::sync::Arc::new(Semaphore::new(0));
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once a call is waiting on the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResolverPort for FakeResolver {
    async fn resolve(
        &self,
        source_url: &str,
        _format_preference: &str,
    ) -> Result<Vec<FileDescriptor>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            self.entered.notify_one();
            gate.acquire().await.unwrap().forget();
        }

        self.answers
            .lock()
            .unwrap()
            .get(source_url)
            .cloned()
            .unwrap_or_else(|| {
                Ok(vec![FileDescriptor::new(
                    "file",
                    "file",
                    format!("{source_url}/file.bin"),
                )])
            })
    }
}

// =============================================================================
// UI signals
// =============================================================================

/// Records every emitted event.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<BatchEvent>>,
}

impl RecordingEmitter {
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn busy_transitions(&self) -> Vec<bool> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BatchEvent::BusyChanged { busy } => Some(busy),
                _ => None,
            })
            .collect()
    }
}

impl BatchEventEmitterPort for RecordingEmitter {
    fn emit(&self, event: BatchEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Records every busy update.
#[derive(Default)]
pub struct RecordingBusySignal {
    updates: Mutex<Vec<bool>>,
}

impl RecordingBusySignal {
    pub fn last(&self) -> Option<bool> {
        self.updates.lock().unwrap().last().copied()
    }
}

impl BusySignalPort for RecordingBusySignal {
    fn set_busy(&self, busy: bool) {
        self.updates.lock().unwrap().push(busy);
    }
}
