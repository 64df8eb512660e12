//! Per-record serialisation of read-modify-write spans.
//!
//! `RecordLocks` is an arena of async mutexes keyed by `(collection, id)`.
//! Slots are created on first use and removed when the last guard for a
//! key is dropped with no waiter queued, so the arena only holds entries
//! for records that are currently being mutated.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::StoreResult;
use crate::kv::{require_id, KvStore, Record};

type Key = (String, String);
type Slots = Arc<Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>>;

#[derive(Clone, Default)]
pub struct RecordLocks {
    slots: Slots,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `(collection, id)`. Held until the guard
    /// is dropped.
    pub async fn acquire(&self, collection: &str, id: &str) -> RecordGuard {
        let key = (collection.to_string(), id.to_string());
        let slot = self.slots.lock().entry(key.clone()).or_default().clone();

        debug!(collection, id, "waiting for record lock");
        let guard = slot.clone().lock_owned().await;
        debug!(collection, id, "record lock acquired");

        RecordGuard {
            guard: Some(guard),
            slot,
            key,
            slots: self.slots.clone(),
        }
    }

    /// Number of live slots.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

pub struct RecordGuard {
    guard: Option<OwnedMutexGuard<()>>,
    slot: Arc<AsyncMutex<()>>,
    key: Key,
    slots: Slots,
}

impl Drop for RecordGuard {
    fn drop(&mut self) {
        // Release first so queued waiters can proceed.
        drop(self.guard.take());

        let mut slots = self.slots.lock();
        // Two references left: the map's and ours. Anyone else holding one
        // is queued on the mutex and needs the slot to stay.
        let idle = Arc::strong_count(&self.slot) == 2
            && slots
                .get(&self.key)
                .is_some_and(|s| Arc::ptr_eq(s, &self.slot));
        if idle {
            slots.remove(&self.key);
        }
    }
}

/// Wraps a backend so that every mutating call on a record runs under that
/// record's lock. Reads are not locked.
#[derive(Clone)]
pub struct LockedStore<S> {
    inner: S,
    locks: RecordLocks,
}

impl<S: KvStore> LockedStore<S> {
    pub fn new(inner: S) -> Self {
        Self::with_locks(inner, RecordLocks::new())
    }

    /// Share a lock arena with other code that mutates the same records.
    pub fn with_locks(inner: S, locks: RecordLocks) -> Self {
        Self { inner, locks }
    }

    pub fn locks(&self) -> &RecordLocks {
        &self.locks
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: KvStore> KvStore for LockedStore<S> {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Record> {
        self.inner.get(collection, id).await
    }

    async fn put(&self, collection: &str, record: Record) -> StoreResult<()> {
        self.inner.put(collection, record).await
    }

    async fn replace(&self, collection: &str, record: Record) -> StoreResult<()> {
        let id = require_id(collection, &record)?.to_string();
        let _guard = self.locks.acquire(collection, &id).await;
        self.inner.replace(collection, record).await
    }

    async fn upsert_fields(&self, collection: &str, id: &str, fields: Record) -> StoreResult<()> {
        let _guard = self.locks.acquire(collection, id).await;
        self.inner.upsert_fields(collection, id, fields).await
    }
}
