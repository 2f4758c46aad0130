//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI:
//! - SQLite key-value store (via bulkdl-db)
//! - HTTP resolver and backend (via bulkdl-download)
//! - Batch manager with no-op UI signals
//!
//! Command handlers receive the composed [`CliContext`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use bulkdl_core::{BatchConfig, NoopBatchEmitter, NoopBusySignal};
use bulkdl_db::{SqliteKeyValueStore, setup_database};
use bulkdl_download::{BatchManager, BatchManagerDeps, HttpBackend, HttpResolver, build_batch_manager};

use crate::commands::RunArgs;
use crate::error::CliError;

const APP_DIR: &str = "bulkdl";
const DB_FILE: &str = "bulkdl.db";

/// Bootstrap configuration for the CLI.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Database file holding the batch.
    pub db_path: PathBuf,
    /// Directory downloads are written to.
    pub download_dir: PathBuf,
    pub batch: BatchConfig,
}

impl CliConfig {
    /// Configuration for commands that only edit the stored batch.
    ///
    /// Automatic ticking is off so nothing is dispatched from a
    /// short-lived process.
    pub fn offline(db: Option<PathBuf>) -> Result<Self> {
        Ok(Self {
            db_path: resolve_db_path(db)?,
            download_dir: default_download_dir(),
            batch: BatchConfig::default().with_auto_tick(false),
        })
    }

    /// Configuration for `run`, with flags applied over the defaults.
    pub fn for_run(db: Option<PathBuf>, args: &RunArgs) -> Result<Self> {
        let mut batch = BatchConfig::default();
        if let Some(limit) = args.concurrency {
            batch = batch.with_concurrency_limit(limit);
        }
        if let Some(format) = &args.format {
            batch = batch.with_format_preference(format.clone());
        }

        Ok(Self {
            db_path: resolve_db_path(db)?,
            download_dir: args.dir.clone().unwrap_or_else(default_download_dir),
            batch,
        })
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub manager: Arc<BatchManager>,
    pub download_dir: PathBuf,
}

impl CliContext {
    /// Access the batch manager.
    pub const fn manager(&self) -> &Arc<BatchManager> {
        &self.manager
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }
}

/// Bootstrap the CLI.
///
/// Opens (and creates if needed) the database, then builds the batch
/// manager over the HTTP adapters.
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let pool = setup_database(&config.db_path)
        .await
        .map_err(|e| CliError::Database(format!("{}: {e:#}", config.db_path.display())))?;

    let manager = build_batch_manager(BatchManagerDeps {
        store: Arc::new(SqliteKeyValueStore::new(pool)),
        resolver: Arc::new(HttpResolver::new()),
        backend: Arc::new(HttpBackend::new(config.download_dir.clone())),
        busy_signal: Arc::new(NoopBusySignal),
        event_emitter: Arc::new(NoopBatchEmitter),
        config: config.batch,
    });

    tracing::debug!(
        target: "bulkdl.cli",
        db = %config.db_path.display(),
        dir = %config.download_dir.display(),
        "bootstrapped"
    );

    Ok(CliContext {
        manager,
        download_dir: config.download_dir,
    })
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `warn`, or `debug` with `--verbose`.
/// Logs go to stderr so they do not tear the progress display.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .ok();
}

fn resolve_db_path(db: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = db {
        return Ok(path);
    }
    let data_dir = dirs::data_dir()
        .ok_or_else(|| CliError::Config("no data directory for this user".to_string()))
        .context("pass --db to choose a database file")?;
    Ok(data_dir.join(APP_DIR).join(DB_FILE))
}

fn default_download_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::home_dir)
        .map_or_else(|| PathBuf::from("."), |dir| dir.join(APP_DIR))
}
