//! Stored record shapes and the in-memory message history.
//!
//! Field names are camelCase on disk; binary fields are base64url.

use std::collections::BTreeMap;

use cc_crypto::encoding::b64;
use cc_crypto::random::SALT_LEN;
use cc_crypto::{CryptoResult, Credential, PublicKey, Scheme, SealedHistory, WrappedKey, NONCE_LEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── keys ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyPairRecord {
    pub id: String,
    /// Base64 SPKI DER.
    pub public_key: String,
    /// AES-256-GCM over the PKCS#8 DER, tag appended.
    #[serde(with = "b64")]
    pub encrypted_private_key: Vec<u8>,
    #[serde(with = "b64")]
    pub wrap_iv: [u8; NONCE_LEN],
    /// Password-derivation salt. Rotated on every password change.
    #[serde(with = "b64")]
    pub salt: [u8; SALT_LEN],
    pub scheme: Scheme,
}

impl KeyPairRecord {
    pub const WRAP_FIELDS: [&'static str; 3] = ["encryptedPrivateKey", "wrapIv", "salt"];

    pub fn new(
        id: &str,
        public: &PublicKey,
        wrapped: WrappedKey,
        salt: [u8; SALT_LEN],
    ) -> CryptoResult<Self> {
        Ok(Self {
            id: id.to_string(),
            public_key: public.to_b64()?,
            encrypted_private_key: wrapped.ciphertext,
            wrap_iv: wrapped.iv,
            salt,
            scheme: public.scheme(),
        })
    }

    pub fn wrapped(&self) -> WrappedKey {
        WrappedKey {
            iv: self.wrap_iv,
            ciphertext: self.encrypted_private_key.clone(),
        }
    }

    pub fn public_key(&self) -> CryptoResult<PublicKey> {
        PublicKey::from_b64(self.scheme, &self.public_key)
    }
}

// ── messages ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageHistoryRecord {
    pub id: String,
    #[serde(with = "b64")]
    pub encrypted_content: Vec<u8>,
    #[serde(with = "b64")]
    pub history_iv: [u8; NONCE_LEN],
}

impl MessageHistoryRecord {
    pub const CONTENT_FIELDS: [&'static str; 2] = ["encryptedContent", "historyIv"];

    pub fn new(id: &str, sealed: SealedHistory) -> Self {
        Self {
            id: id.to_string(),
            encrypted_content: sealed.ciphertext,
            history_iv: sealed.iv,
        }
    }

    pub fn sealed(&self) -> SealedHistory {
        SealedHistory {
            iv: self.history_iv,
            ciphertext: self.encrypted_content.clone(),
        }
    }
}

// ── credentials ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    #[serde(flatten)]
    pub credential: Credential,
}

impl CredentialRecord {
    pub const SECRET_FIELDS: [&'static str; 2] = ["hash", "salt"];

    pub fn new(id: &str, credential: Credential) -> Self {
        Self {
            id: id.to_string(),
            credential,
        }
    }
}

// ── plaintext history ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub sender: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

/// Conversation history, rooms keyed by id. Ordered so the sealed JSON is
/// canonical. Lives in memory only; on disk it is always sealed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageHistory {
    #[serde(default)]
    pub rooms: BTreeMap<String, Vec<HistoryEntry>>,
}

impl MessageHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, room: &str, sender: &str, body: &str) -> &HistoryEntry {
        let entries = self.rooms.entry(room.to_string()).or_default();
        entries.push(HistoryEntry {
            id: Uuid::new_v4(),
            sender: sender.to_string(),
            body: body.to_string(),
            sent_at: Utc::now(),
        });
        &entries[entries.len() - 1]
    }

    pub fn room(&self, room: &str) -> &[HistoryEntry] {
        self.rooms.get(room).map(Vec::as_slice).unwrap_or_default()
    }

    /// Total number of entries across rooms.
    pub fn len(&self) -> usize {
        self.rooms.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
