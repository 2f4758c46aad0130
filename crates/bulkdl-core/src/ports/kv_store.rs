//! Key-value storage port.
//!
//! The batch persists two JSON documents (the item collection and the
//! incoming buffer) under fixed keys. Adapters only need to move opaque JSON
//! values in and out.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::RepositoryError;

/// Durable key-value storage for JSON documents.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch the values of `keys`. Absent keys are omitted from the map.
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, RepositoryError>;

    /// Store every entry of `entries`, replacing previous values.
    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), RepositoryError>;
}

/// In-memory key-value store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryKeyValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: HashMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    fn poisoned() -> RepositoryError {
        RepositoryError::Storage("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, RepositoryError> {
        let entries = self.entries.read().map_err(|_| Self::poisoned())?;
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|v| ((*key).to_string(), v.clone())))
            .collect())
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), RepositoryError> {
        let mut stored = self.entries.write().map_err(|_| Self::poisoned())?;
        stored.extend(entries);
        Ok(())
    }
}
