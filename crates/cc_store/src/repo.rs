//! Typed access to the three collections.
//!
//! Inserts go through `put`. Updates go through `upsert_fields` and only
//! touch the fields that change, so the record id and the fields owned by
//! other flows are left alone.

use cc_crypto::random::SALT_LEN;
use cc_crypto::{Credential, SealedHistory, WrappedKey};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::kv::{fields_of, from_record, to_record, KvStore, CREDENTIALS, KEYS, MESSAGES};
use crate::models::{CredentialRecord, KeyPairRecord, MessageHistoryRecord};

// ── keys ──────────────────────────────────────────────────────────────────────

pub async fn insert_key_pair(store: &dyn KvStore, record: &KeyPairRecord) -> StoreResult<()> {
    store.put(KEYS, to_record(record)?).await
}

pub async fn load_key_pair(store: &dyn KvStore, username: &str) -> StoreResult<KeyPairRecord> {
    let record = store.get(KEYS, username).await?;
    from_record(KEYS, username, record)
}

/// Store a re-wrapped private key together with the salt it was wrapped under.
pub async fn rewrap_key_pair(
    store: &dyn KvStore,
    username: &str,
    wrapped: WrappedKey,
    salt: [u8; SALT_LEN],
) -> StoreResult<()> {
    let mut current = load_key_pair(store, username).await?;
    current.encrypted_private_key = wrapped.ciphertext;
    current.wrap_iv = wrapped.iv;
    current.salt = salt;
    let fields = fields_of(&current, &KeyPairRecord::WRAP_FIELDS)?;
    debug!(username, "storing re-wrapped private key");
    store.upsert_fields(KEYS, username, fields).await
}

// ── messages ──────────────────────────────────────────────────────────────────

/// `None` when the user has never saved a history.
pub async fn load_history(
    store: &dyn KvStore,
    username: &str,
) -> StoreResult<Option<SealedHistory>> {
    match store.get(MESSAGES, username).await {
        Ok(record) => {
            let record: MessageHistoryRecord = from_record(MESSAGES, username, record)?;
            Ok(Some(record.sealed()))
        }
        Err(StoreError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Replace the sealed history. Content and IV are written in one call.
pub async fn store_history(
    store: &dyn KvStore,
    username: &str,
    sealed: SealedHistory,
) -> StoreResult<()> {
    let len = sealed.ciphertext.len();
    let record = MessageHistoryRecord::new(username, sealed);
    let fields = fields_of(&record, &MessageHistoryRecord::CONTENT_FIELDS)?;
    match store.upsert_fields(MESSAGES, username, fields).await {
        Err(StoreError::NotFound { .. }) => store.put(MESSAGES, to_record(&record)?).await?,
        other => other?,
    }
    debug!(username, bytes = len, "stored sealed history");
    Ok(())
}

// ── credentials ───────────────────────────────────────────────────────────────

pub async fn load_credential(store: &dyn KvStore, username: &str) -> StoreResult<Credential> {
    let record = store.get(CREDENTIALS, username).await?;
    let record: CredentialRecord = from_record(CREDENTIALS, username, record)?;
    Ok(record.credential)
}

/// Write the credential whether or not one is already stored.
pub async fn store_credential(
    store: &dyn KvStore,
    username: &str,
    credential: Credential,
) -> StoreResult<()> {
    let record = CredentialRecord::new(username, credential);
    let fields = fields_of(&record, &CredentialRecord::SECRET_FIELDS)?;
    match store.upsert_fields(CREDENTIALS, username, fields).await {
        Err(StoreError::NotFound { .. }) => store.put(CREDENTIALS, to_record(&record)?).await,
        other => other,
    }
}

pub async fn replace_credential(
    store: &dyn KvStore,
    username: &str,
    credential: Credential,
) -> StoreResult<()> {
    let record = CredentialRecord::new(username, credential);
    let fields = fields_of(&record, &CredentialRecord::SECRET_FIELDS)?;
    store.upsert_fields(CREDENTIALS, username, fields).await
}
