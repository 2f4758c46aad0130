//! CLI-specific error types and exit codes.

use bulkdl_core::BatchError;
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Batch operation failed.
    #[error("{0}")]
    Batch(String),

    /// Argument refers to something that does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Storage could not be opened or written.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CliError {
    /// Map error to an exit code (see sysexits.h).
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Batch(_) => 1,
            Self::NotFound(_) => 2,
            Self::Database(_) => 73,
            Self::Config(_) => 78,
        }
    }
}

impl From<BatchError> for CliError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::NotFound { .. } => Self::NotFound(err.to_string()),
            BatchError::Storage(e) => Self::Database(e.to_string()),
            other => Self::Batch(other.to_string()),
        }
    }
}
