//! Resolver port: turns a source URL into downloadable files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ResolveError;

/// One downloadable file found behind a source URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// Stable id within this resolution, used to derive child item ids.
    pub id: String,
    pub title: String,
    /// Direct URL handed to the download backend.
    pub url: String,
}

impl FileDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            url: url.into(),
        }
    }
}

/// Resolves a source URL into zero or more file descriptors.
///
/// Implementations must not retry on their own; the caller bounds the call
/// with a timeout and marks the item failed on any error.
#[async_trait]
pub trait ResolverPort: Send + Sync {
    async fn resolve(
        &self,
        source_url: &str,
        format_preference: &str,
    ) -> Result<Vec<FileDescriptor>, ResolveError>;
}
