//! Item store: persistence of the collection and the incoming buffer.
//!
//! Both documents live in a [`KeyValueStore`] as JSON under fixed keys.
//! A missing or malformed document reads as empty.
//!
//! Every mutation goes through a locked read-transform-write cycle so the
//! scheduler, the tracker and operator actions never overwrite each other.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;

use bulkdl_core::{BackendId, KeyValueStore, RepositoryError, SelectedItem};

use crate::batch::Batch;

/// Key of the item collection.
pub const ITEMS_KEY: &str = "batch_items";
/// Key of the incoming selection buffer.
pub const INCOMING_KEY: &str = "batch_incoming";

/// Typed access to the persisted batch documents.
pub struct ItemStore {
    kv: Arc<dyn KeyValueStore>,
    write_lock: Mutex<()>,
}

impl ItemStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            write_lock: Mutex::new(()),
        }
    }

    /// Read the collection.
    pub async fn load(&self) -> Result<Batch, RepositoryError> {
        self.read(ITEMS_KEY).await
    }

    /// Read the incoming buffer.
    pub async fn load_incoming(&self) -> Result<Vec<SelectedItem>, RepositoryError> {
        self.read(INCOMING_KEY).await
    }

    /// Overwrite the collection.
    pub async fn save(&self, batch: &Batch) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        self.write(HashMap::from([(ITEMS_KEY.to_string(), encode(batch)?)]))
            .await
    }

    /// Overwrite the incoming buffer.
    pub async fn save_incoming(&self, incoming: &[SelectedItem]) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        self.write(HashMap::from([(INCOMING_KEY.to_string(), encode(incoming)?)]))
            .await
    }

    /// Read, transform and write the collection.
    ///
    /// Groups are re-aggregated after `transform`; nothing is written when
    /// the collection did not change.
    pub async fn update<T>(
        &self,
        transform: impl FnOnce(&mut Batch) -> T + Send,
    ) -> Result<T, RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let mut batch: Batch = self.read(ITEMS_KEY).await?;
        let before = batch.clone();
        let result = transform(&mut batch);
        batch.recompute_parents();

        if batch != before {
            self.write(HashMap::from([(ITEMS_KEY.to_string(), encode(&batch)?)]))
                .await?;
        }
        Ok(result)
    }

    /// Read, transform and write the incoming buffer.
    pub async fn update_incoming<T>(
        &self,
        transform: impl FnOnce(&mut Vec<SelectedItem>) -> T + Send,
    ) -> Result<T, RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let mut incoming: Vec<SelectedItem> = self.read(INCOMING_KEY).await?;
        let before = incoming.clone();
        let result = transform(&mut incoming);

        if incoming != before {
            self.write(HashMap::from([(INCOMING_KEY.to_string(), encode(&incoming)?)]))
                .await?;
        }
        Ok(result)
    }

    /// Move the incoming buffer into the collection.
    ///
    /// Both documents are written in one `set` call. Returns the number of
    /// items added and the resulting collection.
    pub async fn drain_incoming(&self) -> Result<(usize, Batch), RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let incoming: Vec<SelectedItem> = self.read(INCOMING_KEY).await?;
        let mut batch: Batch = self.read(ITEMS_KEY).await?;
        if incoming.is_empty() {
            return Ok((0, batch));
        }

        let added = batch.merge_incoming(incoming);
        let empty: Vec<SelectedItem> = Vec::new();
        self.write(HashMap::from([
            (ITEMS_KEY.to_string(), encode(&batch)?),
            (INCOMING_KEY.to_string(), encode(&empty)?),
        ]))
        .await?;
        Ok((added, batch))
    }

    /// Empty the collection and the incoming buffer in one write.
    ///
    /// Returns the transfers that were attached to the cleared items.
    pub async fn clear_all(&self) -> Result<Vec<BackendId>, RepositoryError> {
        let _guard = self.write_lock.lock().await;

        let mut batch: Batch = self.read(ITEMS_KEY).await?;
        let to_cancel = batch.clear_all();
        let empty: Vec<SelectedItem> = Vec::new();
        self.write(HashMap::from([
            (ITEMS_KEY.to_string(), encode(&batch)?),
            (INCOMING_KEY.to_string(), encode(&empty)?),
        ]))
        .await?;
        Ok(to_cancel)
    }

    async fn read<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, RepositoryError> {
        let mut values = self.kv.get(&[key]).await?;
        let Some(value) = values.remove(key) else {
            return Ok(T::default());
        };

        match serde_json::from_value(value) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                tracing::warn!(
                    target: "bulkdl.store",
                    key,
                    error = %e,
                    "Stored document is malformed, reading as empty"
                );
                Ok(T::default())
            }
        }
    }

    async fn write(&self, entries: HashMap<String, Value>) -> Result<(), RepositoryError> {
        self.kv.set(entries).await
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Value, RepositoryError> {
    serde_json::to_value(value).map_err(|e| RepositoryError::Serialization(e.to_string()))
}
