//! Key-value store contract.
//!
//! Records are JSON objects. The `id` field carries the owner's username and
//! is the record key within its collection. Backends provide single-call
//! `get`/`put`/`replace`; the field-level upserts are read-modify-write on
//! top of those and are only safe when the caller serialises them (see
//! `LockedStore`).

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

pub type Record = serde_json::Map<String, Value>;

pub const ID_FIELD: &str = "id";

pub const KEYS: &str = "keys";
pub const MESSAGES: &str = "messages";
pub const CREDENTIALS: &str = "credentials";

#[async_trait]
pub trait KvStore: Send + Sync {
    /// `NotFound` if no record has this id.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Record>;

    /// Insert a new record. `AlreadyExists` if its id is taken.
    async fn put(&self, collection: &str, record: Record) -> StoreResult<()>;

    /// Overwrite an existing record. `NotFound` if there is none.
    async fn replace(&self, collection: &str, record: Record) -> StoreResult<()>;

    /// Merge `fields` into the stored record and write it back.
    async fn upsert_fields(&self, collection: &str, id: &str, fields: Record) -> StoreResult<()> {
        let mut record = self.get(collection, id).await?;
        merge_fields(collection, id, &mut record, fields)?;
        self.replace(collection, record).await
    }

    async fn upsert_field(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        value: Value,
    ) -> StoreResult<()> {
        let mut fields = Record::new();
        fields.insert(field.to_string(), value);
        self.upsert_fields(collection, id, fields).await
    }
}

/// The id of a record is immutable; every other field may be replaced.
pub fn merge_fields(
    collection: &str,
    id: &str,
    record: &mut Record,
    fields: Record,
) -> StoreResult<()> {
    for (field, value) in fields {
        if field == ID_FIELD && value.as_str() != Some(id) {
            return Err(StoreError::Malformed {
                collection: collection.to_string(),
                id: id.to_string(),
                reason: "record id cannot be changed".into(),
            });
        }
        record.insert(field, value);
    }
    Ok(())
}

pub fn record_id(record: &Record) -> Option<&str> {
    record.get(ID_FIELD).and_then(Value::as_str)
}

pub(crate) fn require_id<'a>(collection: &str, record: &'a Record) -> StoreResult<&'a str> {
    record_id(record).ok_or_else(|| StoreError::Malformed {
        collection: collection.to_string(),
        id: String::new(),
        reason: format!("missing string '{ID_FIELD}' field"),
    })
}

pub fn to_record<T: Serialize>(value: &T) -> StoreResult<Record> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Malformed {
            collection: String::new(),
            id: String::new(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}

/// Keep only `names` from the serialised form of `value`.
pub fn fields_of<T: Serialize>(value: &T, names: &[&str]) -> StoreResult<Record> {
    let mut record = to_record(value)?;
    record.retain(|k, _| names.contains(&k.as_str()));
    Ok(record)
}

pub fn from_record<T: DeserializeOwned>(collection: &str, id: &str, record: Record) -> StoreResult<T> {
    serde_json::from_value(Value::Object(record)).map_err(|e| StoreError::Malformed {
        collection: collection.to_string(),
        id: id.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> Record {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn merge_replaces_only_named_fields() {
        let mut rec = record(json!({"id": "alice", "a": 1, "b": 2}));
        merge_fields("keys", "alice", &mut rec, record(json!({"b": 3, "c": 4}))).unwrap();
        assert_eq!(Value::Object(rec), json!({"id": "alice", "a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn merge_refuses_to_rename() {
        let mut rec = record(json!({"id": "alice"}));
        let err = merge_fields("keys", "alice", &mut rec, record(json!({"id": "mallory"})));
        assert!(matches!(err, Err(StoreError::Malformed { .. })));
        // Restating the same id is harmless.
        merge_fields("keys", "alice", &mut rec, record(json!({"id": "alice"}))).unwrap();
    }

    #[test]
    fn fields_of_filters() {
        let rec = fields_of(&json!({"id": "x", "hash": "h", "salt": "s"}), &["hash"]).unwrap();
        assert_eq!(Value::Object(rec), json!({"hash": "h"}));
    }

    #[test]
    fn non_objects_are_not_records() {
        assert!(to_record(&json!([1, 2])).is_err());
        assert!(require_id("keys", &record(json!({"id": 7}))).is_err());
    }
}
