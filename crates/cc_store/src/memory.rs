//! In-process backend.
//!
//! Each call is atomic on its own, but `replace` yields to the scheduler
//! before writing so that unsynchronised read-modify-write sequences
//! interleave the way they would against a real database.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::{require_id, KvStore, Record};

type Key = (String, String);

/// Cheap to clone; clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    records: Arc<RwLock<HashMap<Key, Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

fn key(collection: &str, id: &str) -> Key {
    (collection.to_string(), id.to_string())
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Record> {
        let record = self.records.read().get(&key(collection, id)).cloned();
        tokio::task::yield_now().await;
        record.ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn put(&self, collection: &str, record: Record) -> StoreResult<()> {
        let id = require_id(collection, &record)?.to_string();
        let mut records = self.records.write();
        let slot = key(collection, &id);
        if records.contains_key(&slot) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id,
            });
        }
        debug!(collection, id = %id, "memory put");
        records.insert(slot, record);
        Ok(())
    }

    async fn replace(&self, collection: &str, record: Record) -> StoreResult<()> {
        let id = require_id(collection, &record)?.to_string();
        tokio::task::yield_now().await;
        let mut records = self.records.write();
        match records.get_mut(&key(collection, &id)) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StoreError::not_found(collection, &id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: serde_json::Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn put_get_and_duplicate() {
        let store = MemoryStore::new();
        store.put("keys", rec(json!({"id": "alice", "v": 1}))).await.unwrap();
        assert_eq!(store.get("keys", "alice").await.unwrap()["v"], 1);

        let err = store.put("keys", rec(json!({"id": "alice"}))).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
        // Same id in another collection is a different record.
        store.put("messages", rec(json!({"id": "alice"}))).await.unwrap();
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn missing_records() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.get("keys", "nobody").await,
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.upsert_field("keys", "nobody", "v", json!(1)).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upsert_field_keeps_other_fields() {
        let store = MemoryStore::new();
        store
            .put("keys", rec(json!({"id": "bob", "a": 1, "b": 2})))
            .await
            .unwrap();
        store.upsert_field("keys", "bob", "b", json!(20)).await.unwrap();
        let got = store.get("keys", "bob").await.unwrap();
        assert_eq!(serde_json::Value::Object(got), json!({"id": "bob", "a": 1, "b": 20}));
    }

    #[tokio::test]
    async fn records_need_an_id() {
        let store = MemoryStore::new();
        let err = store.put("keys", rec(json!({"v": 1}))).await.unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
