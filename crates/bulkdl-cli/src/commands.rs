//! Available subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Available commands.
///
/// Everything except `run` only edits the stored batch; downloads are
/// dispatched by a `run` process.
#[derive(Subcommand)]
pub enum Commands {
    /// Queue URLs for download
    Add {
        /// Source URLs (plain files or `.urls` manifests)
        #[arg(required = true)]
        urls: Vec<String>,
        /// Title shown instead of the URL's file name
        #[arg(short, long)]
        title: Option<String>,
        /// Queue under a fresh id even if the URL is already in the batch
        #[arg(long)]
        again: bool,
    },

    /// Download the batch, showing progress until it drains
    Run(RunArgs),

    /// Show every item of the batch
    List,

    /// Retry a failed item
    #[command(group = clap::ArgGroup::new("target").required(true))]
    Retry {
        /// Item to retry
        #[arg(group = "target")]
        id: Option<String>,
        /// Retry every failed item
        #[arg(long, group = "target")]
        all: bool,
    },

    /// Pause every running download
    Pause,

    /// Resume every paused download
    Resume,

    /// Remove an item (a group takes its files along)
    Remove {
        /// Item to remove
        id: String,
    },

    /// Remove every item
    Clear,

    /// Remove completed items
    ClearCompleted,

    /// Reveal a downloaded file in the file manager
    Open {
        /// Item whose file to show
        id: String,
    },
}

/// Arguments of `bulkdl run`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// URLs to queue before starting
    pub urls: Vec<String>,
    /// Maximum simultaneous downloads
    #[arg(short, long, env = "BULKDL_CONCURRENCY")]
    pub concurrency: Option<usize>,
    /// Directory downloads are written to
    #[arg(short, long, env = "BULKDL_DIR")]
    pub dir: Option<PathBuf>,
    /// Preferred file extension when a manifest offers several (or "best")
    #[arg(short, long, env = "BULKDL_FORMAT")]
    pub format: Option<String>,
}
