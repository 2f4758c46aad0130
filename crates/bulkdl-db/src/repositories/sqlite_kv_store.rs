//! `SQLite` implementation of the `KeyValueStore` port.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use bulkdl_core::{KeyValueStore, RepositoryError};

/// Stores JSON documents as text rows of the `kv_store` table.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// Create a new store over a pool whose schema is already set up.
    pub const fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn storage_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, keys: &[&str]) -> Result<HashMap<String, Value>, RepositoryError> {
        let mut values = HashMap::with_capacity(keys.len());

        for key in keys {
            let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
                .bind(*key)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_err)?;

            let Some(row) = row else { continue };
            let raw: String = row.get("value");
            match serde_json::from_str(&raw) {
                Ok(value) => {
                    values.insert((*key).to_string(), value);
                }
                Err(e) => {
                    // Treated as absent; the caller falls back to its default.
                    tracing::warn!(target: "bulkdl.db", key, error = %e, "stored value is not valid JSON");
                }
            }
        }

        Ok(values)
    }

    async fn set(&self, entries: HashMap<String, Value>) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        for (key, value) in entries {
            let json = serde_json::to_string(&value)
                .map_err(|e| RepositoryError::Serialization(e.to_string()))?;

            sqlx::query(
                r"
                INSERT INTO kv_store (key, value, updated_at)
                VALUES (?, ?, datetime('now'))
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                ",
            )
            .bind(&key)
            .bind(&json)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        }

        tx.commit().await.map_err(storage_err)
    }
}
