//! Integration tests for the file-backed key-value store.

use std::collections::HashMap;

use bulkdl_core::KeyValueStore;
use bulkdl_db::{SqliteKeyValueStore, setup_database};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn test_values_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("bulkdl.db");

    {
        let store = SqliteKeyValueStore::new(setup_database(&db_path).await.unwrap());
        store
            .set(HashMap::from([
                ("batch_items".to_string(), json!([{"kind": "pending"}])),
                ("batch_incoming".to_string(), json!([])),
            ]))
            .await
            .unwrap();
    }

    let store = SqliteKeyValueStore::new(setup_database(&db_path).await.unwrap());
    let values = store.get(&["batch_items", "batch_incoming"]).await.unwrap();

    assert_eq!(values.len(), 2);
    assert_eq!(values["batch_items"][0]["kind"], "pending");
}
