//! Error types for batch operations and their collaborators.
//!
//! Each port has its own error enum so adapters never leak their
//! implementation errors (`sqlx`, `reqwest`, `std::io`) into the core.

use thiserror::Error;

use crate::items::{BackendId, ItemId};

/// Result alias for operations exposed by the batch manager.
pub type BatchResult<T> = Result<T, BatchError>;

/// Domain-specific errors for key-value storage.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The requested key was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage backend error (database, filesystem, etc.).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors returned by a resolver adapter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The resolver did not answer in time.
    #[error("Resolution timed out after {seconds}s")]
    Timeout {
        /// Timeout that elapsed, in seconds.
        seconds: u64,
    },

    /// Network/HTTP error while resolving.
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// HTTP status code if available.
        status_code: Option<u16>,
    },

    /// The source URL cannot be resolved by this adapter.
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    #[error("{0}")]
    Other(String),
}

impl ResolveError {
    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
            status_code: None,
        }
    }

    /// Create a network error with an HTTP status code.
    pub fn network_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Network {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// Create an invalid source error.
    pub fn invalid_source(message: impl Into<String>) -> Self {
        Self::InvalidSource(message.into())
    }
}

/// Errors returned by a download backend adapter.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend has no transfer with this id.
    #[error("Unknown download: {id}")]
    UnknownDownload { id: BackendId },

    /// The backend refused to start a transfer.
    #[error("Failed to start download: {0}")]
    Start(String),

    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io { kind: String, message: String },

    /// Network/HTTP error during transfer.
    #[error("Network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Create an unknown download error.
    #[must_use]
    pub const fn unknown(id: BackendId) -> Self {
        Self::UnknownDownload { id }
    }

    /// Create a start error.
    pub fn start(message: impl Into<String>) -> Self {
        Self::Start(message.into())
    }

    /// Capture a `std::io::Error` as kind and message strings.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }
}

/// Errors surfaced by the batch manager to its callers.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Reading or writing the collection failed.
    #[error(transparent)]
    Storage(#[from] RepositoryError),

    /// No item with this id exists in the collection.
    #[error("Item not found: {id}")]
    NotFound { id: ItemId },

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("{0}")]
    Other(String),
}

impl BatchError {
    /// Create a not found error.
    pub fn not_found(id: impl Into<ItemId>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Whether this error means the requested item does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BatchError::not_found("abc");
        assert_eq!(err.to_string(), "Item not found: abc");
        assert!(err.is_not_found());

        let err = BackendError::unknown(BackendId(3));
        assert_eq!(err.to_string(), "Unknown download: 3");

        let err = ResolveError::Timeout { seconds: 15 };
        assert_eq!(err.to_string(), "Resolution timed out after 15s");
    }

    #[test]
    fn test_repository_error_converts() {
        let err: BatchError = RepositoryError::Storage("disk full".to_string()).into();
        assert!(matches!(err, BatchError::Storage(_)));
        assert_eq!(err.to_string(), "Storage error: disk full");
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = BackendError::from_io_error(&io);
        assert!(matches!(err, BackendError::Io { ref kind, .. } if kind == "NotFound"));
    }
}
