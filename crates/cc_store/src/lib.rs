//! cc_store: Encrypted persistence and account flows for Cipher Chat
//!
//! # Storage strategy
//! The store is a plain key-value backend: records are JSON objects keyed
//! by `(collection, id)` where `id` is the username. Nothing secret is ever
//! written in the clear:
//! - Private keys are wrapped under the password-derived key (AES-256-GCM).
//! - Message history is sealed as one blob under the same key.
//! - Credentials are salted SHA-256 digests.
//!
//! # Concurrency
//! Backends only promise single-call atomicity. Read-modify-write spans
//! (`upsert_fields`, password change, history append) are serialised per
//! record through `RecordLocks`, either by wrapping a backend in
//! `LockedStore` or by taking the account lock explicitly.

pub mod account;
pub mod config;
pub mod error;
pub mod kv;
pub mod locks;
pub mod memory;
pub mod models;
pub mod repo;
pub mod session;
pub mod sqlite;

pub use account::Accounts;
pub use config::KeyringConfig;
pub use error::{StoreError, StoreResult};
pub use kv::{KvStore, Record};
pub use locks::{LockedStore, RecordGuard, RecordLocks};
pub use memory::MemoryStore;
pub use models::{HistoryEntry, MessageHistory};
pub use session::Session;
pub use sqlite::SqliteStore;
