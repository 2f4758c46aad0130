//! HTTP download backend.
//!
//! Each transfer streams one URL into a file of the download directory.
//! Pausing cancels the running request; resuming issues a new request with a
//! `Range` header starting at the bytes already on disk. Servers that ignore
//! the range get the file rewritten from the start.
//!
//! Every run of a transfer carries a generation number. Only the run whose
//! generation is still current may record a final state, so a run that was
//! paused and superseded cannot overwrite its successor.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::RANGE;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;
use url::Url;

use bulkdl_core::{
    BackendChange, BackendError, BackendId, BackendSnapshot, BackendState, DownloadBackendPort,
};

use super::{USER_AGENT, file_name, sanitize_file_name};

/// Capacity of the change notification channel.
const CHANGE_CHANNEL_CAPACITY: usize = 1024;
/// Minimum interval between two byte-count notifications of one transfer.
const BYTES_NOTIFY_INTERVAL: Duration = Duration::from_millis(100);

struct Transfer {
    url: String,
    path: PathBuf,
    received: u64,
    total: Option<u64>,
    state: BackendState,
    generation: u64,
    cancel: CancellationToken,
    /// Held by the run writing the file.
    file_lock: Arc<Mutex<()>>,
}

impl Transfer {
    const fn snapshot(&self) -> BackendSnapshot {
        BackendSnapshot {
            received_bytes: self.received,
            total_bytes: self.total,
            state: self.state,
        }
    }
}

struct Inner {
    client: reqwest::Client,
    download_dir: PathBuf,
    transfers: Mutex<HashMap<BackendId, Transfer>>,
    next_id: AtomicU64,
    changes: broadcast::Sender<BackendChange>,
}

/// Parameters of one run, copied out of the transfer table.
struct Run {
    id: BackendId,
    url: String,
    path: PathBuf,
    generation: u64,
    cancel: CancellationToken,
    file_lock: Arc<Mutex<()>>,
}

/// Download backend streaming over HTTP into a directory.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<Inner>,
}

impl HttpBackend {
    /// Create a backend writing into `download_dir`.
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self::with_client(client, download_dir)
    }

    /// Use a preconfigured client.
    pub fn with_client(client: reqwest::Client, download_dir: impl Into<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                client,
                download_dir: download_dir.into(),
                transfers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                changes,
            }),
        }
    }

    /// Directory downloads are written to.
    pub fn download_dir(&self) -> &Path {
        &self.inner.download_dir
    }

    /// Local path of a transfer.
    pub async fn path_of(&self, id: BackendId) -> Option<PathBuf> {
        self.inner
            .transfers
            .lock()
            .await
            .get(&id)
            .map(|t| t.path.clone())
    }

    fn spawn_run(&self, run: Run) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.run(run).await;
        });
    }
}

impl Inner {
    fn notify(&self, change: BackendChange) {
        // No receivers is fine.
        let _ = self.changes.send(change);
    }

    async fn set_state(&self, id: BackendId, generation: u64, state: BackendState) {
        {
            let mut transfers = self.transfers.lock().await;
            let Some(transfer) = transfers.get_mut(&id) else {
                return;
            };
            if transfer.generation != generation {
                return;
            }
            transfer.state = state;
        }
        self.notify(BackendChange::state(id, state));
    }

    async fn record_bytes(&self, id: BackendId, generation: u64, received: u64, total: Option<u64>) {
        let mut transfers = self.transfers.lock().await;
        if let Some(transfer) = transfers.get_mut(&id) {
            if transfer.generation == generation {
                transfer.received = received;
                transfer.total = total;
            }
        }
    }

    async fn run(&self, run: Run) {
        let _file = run.file_lock.lock().await;
        if run.cancel.is_cancelled() {
            return;
        }

        let offset = self
            .transfers
            .lock()
            .await
            .get(&run.id)
            .map_or(0, |t| t.received);

        match self.stream(&run, offset).await {
            Ok(true) => {
                tracing::debug!(target: "bulkdl.http", backend_id = %run.id, "Transfer complete");
                self.set_state(run.id, run.generation, BackendState::Complete)
                    .await;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(target: "bulkdl.http", backend_id = %run.id, url = %run.url, error = %e, "Transfer interrupted");
                self.set_state(run.id, run.generation, BackendState::Interrupted)
                    .await;
            }
        }
    }

    /// Stream the response body into the file.
    ///
    /// Returns false when the run was cancelled before the body ended.
    async fn stream(&self, run: &Run, offset: u64) -> Result<bool, BackendError> {
        let mut request = self.client.get(&run.url);
        if offset > 0 {
            request = request.header(RANGE, format!("bytes={offset}-"));
        }

        let mut response = tokio::select! {
            () = run.cancel.cancelled() => return Ok(false),
            response = request.send() => response.map_err(|e| BackendError::network(e.to_string()))?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::network(format!("HTTP {status}")));
        }

        let resumed = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
        let mut received = if resumed { offset } else { 0 };
        let total = response.content_length().map(|len| len + received);

        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(resumed)
            .truncate(!resumed)
            .open(&run.path)
            .await
            .map_err(|e| BackendError::from_io_error(&e))?;

        self.record_bytes(run.id, run.generation, received, total).await;
        self.notify(BackendChange::bytes(run.id, received, total));
        let mut last_notify = Instant::now();

        loop {
            let chunk = tokio::select! {
                () = run.cancel.cancelled() => {
                    file.flush().await.map_err(|e| BackendError::from_io_error(&e))?;
                    return Ok(false);
                }
                chunk = response.chunk() => chunk.map_err(|e| BackendError::network(e.to_string()))?,
            };
            let Some(chunk) = chunk else {
                break;
            };

            file.write_all(&chunk)
                .await
                .map_err(|e| BackendError::from_io_error(&e))?;
            received += chunk.len() as u64;
            self.record_bytes(run.id, run.generation, received, total).await;

            if last_notify.elapsed() >= BYTES_NOTIFY_INTERVAL {
                last_notify = Instant::now();
                self.notify(BackendChange::bytes(run.id, received, total));
            }
        }

        file.flush().await.map_err(|e| BackendError::from_io_error(&e))?;
        Ok(true)
    }

    /// Pick a file name in the download directory not used by a file or by
    /// another transfer.
    fn unique_path(&self, name: &str, taken: &HashSet<PathBuf>) -> PathBuf {
        let candidate = self.download_dir.join(name);
        if !candidate.exists() && !taken.contains(&candidate) {
            return candidate;
        }

        let path = Path::new(name);
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
        let extension = path.extension().and_then(|e| e.to_str());

        (1u32..)
            .map(|n| {
                let numbered = extension.map_or_else(
                    || format!("{stem} ({n})"),
                    |ext| format!("{stem} ({n}).{ext}"),
                );
                self.download_dir.join(numbered)
            })
            .find(|candidate| !candidate.exists() && !taken.contains(candidate))
            .unwrap_or(candidate)
    }
}

#[async_trait]
impl DownloadBackendPort for HttpBackend {
    async fn start(&self, url: &str) -> Result<BackendId, BackendError> {
        let parsed = Url::parse(url).map_err(|e| BackendError::start(format!("{url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(BackendError::start(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        tokio::fs::create_dir_all(&self.inner.download_dir)
            .await
            .map_err(|e| BackendError::from_io_error(&e))?;

        let id = BackendId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        let name = file_name(&parsed)
            .map(|name| sanitize_file_name(&name))
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("download-{id}"));

        let run = {
            let mut transfers = self.inner.transfers.lock().await;
            let taken: HashSet<PathBuf> = transfers.values().map(|t| t.path.clone()).collect();
            let path = self.inner.unique_path(&name, &taken);

            let transfer = Transfer {
                url: url.to_string(),
                path: path.clone(),
                received: 0,
                total: None,
                state: BackendState::InProgress,
                generation: 0,
                cancel: CancellationToken::new(),
                file_lock: Arc::new(Mutex::new(())),
            };
            let run = Run {
                id,
                url: transfer.url.clone(),
                path,
                generation: 0,
                cancel: transfer.cancel.clone(),
                file_lock: Arc::clone(&transfer.file_lock),
            };
            transfers.insert(id, transfer);
            run
        };

        tracing::debug!(target: "bulkdl.http", backend_id = %id, url, path = %run.path.display(), "Transfer started");
        self.inner
            .notify(BackendChange::state(id, BackendState::InProgress));
        self.spawn_run(run);
        Ok(id)
    }

    async fn pause(&self, id: BackendId) -> Result<(), BackendError> {
        {
            let mut transfers = self.inner.transfers.lock().await;
            let transfer = transfers
                .get_mut(&id)
                .ok_or_else(|| BackendError::unknown(id))?;
            if transfer.state != BackendState::InProgress {
                return Ok(());
            }
            transfer.cancel.cancel();
            transfer.state = BackendState::Paused;
        }
        self.inner.notify(BackendChange::state(id, BackendState::Paused));
        Ok(())
    }

    async fn resume(&self, id: BackendId) -> Result<(), BackendError> {
        let run = {
            let mut transfers = self.inner.transfers.lock().await;
            let transfer = transfers
                .get_mut(&id)
                .ok_or_else(|| BackendError::unknown(id))?;
            if transfer.state != BackendState::Paused {
                return Ok(());
            }
            transfer.generation += 1;
            transfer.cancel = CancellationToken::new();
            transfer.state = BackendState::InProgress;
            Run {
                id,
                url: transfer.url.clone(),
                path: transfer.path.clone(),
                generation: transfer.generation,
                cancel: transfer.cancel.clone(),
                file_lock: Arc::clone(&transfer.file_lock),
            }
        };

        self.inner
            .notify(BackendChange::state(id, BackendState::InProgress));
        self.spawn_run(run);
        Ok(())
    }

    async fn cancel(&self, id: BackendId) -> Result<(), BackendError> {
        let transfer = self
            .inner
            .transfers
            .lock()
            .await
            .remove(&id)
            .ok_or_else(|| BackendError::unknown(id))?;
        transfer.cancel.cancel();

        if transfer.state != BackendState::Complete {
            // Wait for the run to release the file before deleting it.
            let _file = transfer.file_lock.lock().await;
            if let Err(e) = tokio::fs::remove_file(&transfer.path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    return Err(BackendError::from_io_error(&e));
                }
            }
        }
        tracing::debug!(target: "bulkdl.http", backend_id = %id, "Transfer cancelled");
        Ok(())
    }

    async fn show(&self, id: BackendId) -> Result<(), BackendError> {
        let path = self
            .path_of(id)
            .await
            .ok_or_else(|| BackendError::unknown(id))?;
        let folder = path.parent().unwrap_or_else(|| self.download_dir());

        tokio::process::Command::new(opener())
            .arg(folder)
            .spawn()
            .map_err(|e| BackendError::from_io_error(&e))?;
        Ok(())
    }

    async fn query(&self, id: BackendId) -> Result<BackendSnapshot, BackendError> {
        self.inner
            .transfers
            .lock()
            .await
            .get(&id)
            .map(Transfer::snapshot)
            .ok_or_else(|| BackendError::unknown(id))
    }

    fn subscribe(&self) -> broadcast::Receiver<BackendChange> {
        self.inner.changes.subscribe()
    }
}

#[cfg(target_os = "macos")]
const fn opener() -> &'static str {
    "open"
}

#[cfg(target_os = "windows")]
const fn opener() -> &'static str {
    "explorer"
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const fn opener() -> &'static str {
    "xdg-open"
}
