//! Unlocked account state.
//!
//! A `Session` holds the unwrapped private key and the password key for as
//! long as the user stays logged in, plus one `SessionCipher` per peer.
//! `lock()` (or dropping the session) wipes all of it.

use std::collections::HashMap;
use std::sync::Arc;

use cc_crypto::random::SALT_LEN;
use cc_crypto::{
    open_history, seal_history, MessageCiphertext, PrivateKey, PublicKey, Scheme, SessionCipher,
    SymmetricKey,
};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::account::Accounts;
use crate::error::{StoreError, StoreResult};
use crate::models::{HistoryEntry, MessageHistory};
use crate::repo;

struct Unlocked {
    private: PrivateKey,
    password_key: SymmetricKey,
    /// Salt `password_key` was derived under. A different salt in the key
    /// record means the password changed since login.
    salt: [u8; SALT_LEN],
    channels: HashMap<String, (PublicKey, Arc<SessionCipher>)>,
}

pub struct Session {
    accounts: Accounts,
    username: String,
    public: PublicKey,
    state: RwLock<Option<Unlocked>>,
}

impl Session {
    pub(crate) fn new(
        accounts: Accounts,
        username: &str,
        private: PrivateKey,
        password_key: SymmetricKey,
        salt: [u8; SALT_LEN],
    ) -> Self {
        Self {
            accounts,
            username: username.to_string(),
            public: private.public_key(),
            state: RwLock::new(Some(Unlocked {
                private,
                password_key,
                salt,
                channels: HashMap::new(),
            })),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn scheme(&self) -> Scheme {
        self.public.scheme()
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    pub fn is_locked(&self) -> bool {
        self.state.read().is_none()
    }

    /// Drop and zeroize the key material. Every later call fails with
    /// `StoreError::Locked`.
    pub fn lock(&self) {
        if self.state.write().take().is_some() {
            info!(username = %self.username, "session locked");
        }
    }

    fn with_unlocked<R>(&self, f: impl FnOnce(&Unlocked) -> R) -> StoreResult<R> {
        self.state.read().as_ref().map(f).ok_or(StoreError::Locked)
    }

    /// The cipher for `peer`, established on first use. A different public
    /// key for a known peer replaces the cached cipher.
    pub fn channel(&self, peer: &str, peer_public: &PublicKey) -> StoreResult<Arc<SessionCipher>> {
        let cached = self.with_unlocked(|u| {
            u.channels
                .get(peer)
                .filter(|(key, _)| key == peer_public)
                .map(|(_, cipher)| cipher.clone())
        })?;
        if let Some(cipher) = cached {
            return Ok(cipher);
        }

        let mut state = self.state.write();
        let unlocked = state.as_mut().ok_or(StoreError::Locked)?;
        let cipher = Arc::new(SessionCipher::establish(&unlocked.private, peer_public)?);
        let previous = unlocked
            .channels
            .insert(peer.to_string(), (peer_public.clone(), cipher.clone()));
        if previous.is_some() {
            warn!(username = %self.username, peer, "peer public key changed, channel replaced");
        } else {
            debug!(username = %self.username, peer, scheme = %cipher.scheme(), "channel established");
        }
        Ok(cipher)
    }

    pub fn encrypt_for(
        &self,
        peer: &str,
        peer_public: &PublicKey,
        message: &str,
    ) -> StoreResult<MessageCiphertext> {
        Ok(self.channel(peer, peer_public)?.encrypt(message)?)
    }

    pub fn decrypt_from(
        &self,
        peer: &str,
        peer_public: &PublicKey,
        ciphertext: &MessageCiphertext,
    ) -> StoreResult<String> {
        Ok(self.channel(peer, peer_public)?.decrypt(ciphertext)?)
    }

    pub async fn load_history(&self) -> StoreResult<MessageHistory> {
        let (key, salt) = self.with_unlocked(|u| (u.password_key.clone(), u.salt))?;
        self.read_history(&key, salt).await
    }

    /// Replace the stored history with `history`.
    pub async fn save_history(&self, history: &MessageHistory) -> StoreResult<()> {
        let _guard = self.accounts.lock_account(&self.username).await;
        let (key, salt) = self.with_unlocked(|u| (u.password_key.clone(), u.salt))?;
        self.ensure_current(salt).await?;
        self.write_history(history, &key).await
    }

    /// Load, append and save as one step under the account lock.
    pub async fn append_message(
        &self,
        room: &str,
        sender: &str,
        body: &str,
    ) -> StoreResult<HistoryEntry> {
        let _guard = self.accounts.lock_account(&self.username).await;
        let (key, salt) = self.with_unlocked(|u| (u.password_key.clone(), u.salt))?;
        self.ensure_current(salt).await?;

        let mut history = self.read_history(&key, salt).await?;
        let entry = history.push(room, sender, body).clone();
        self.write_history(&history, &key).await?;
        Ok(entry)
    }

    async fn read_history(
        &self,
        key: &SymmetricKey,
        salt: [u8; SALT_LEN],
    ) -> StoreResult<MessageHistory> {
        let store = self.accounts.store();
        let Some(sealed) = repo::load_history(store, &self.username).await? else {
            return Ok(MessageHistory::new());
        };
        match open_history(&sealed, key) {
            Ok(history) => Ok(history),
            Err(e) => {
                // Re-sealed under a newer password, or damaged.
                self.ensure_current(salt).await?;
                warn!(username = %self.username, error = %e, "stored history failed to open");
                Err(StoreError::Integrity(self.username.clone()))
            }
        }
    }

    async fn write_history(&self, history: &MessageHistory, key: &SymmetricKey) -> StoreResult<()> {
        let sealed = seal_history(history, key)?;
        repo::store_history(self.accounts.store(), &self.username, sealed).await?;
        info!(username = %self.username, entries = history.len(), "history saved");
        Ok(())
    }

    /// `Locked` if the password changed since this session was opened.
    async fn ensure_current(&self, salt: [u8; SALT_LEN]) -> StoreResult<()> {
        let record = repo::load_key_pair(self.accounts.store(), &self.username).await?;
        if record.salt != salt {
            warn!(username = %self.username, "password changed elsewhere, locking session");
            self.lock();
            return Err(StoreError::Locked);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("username", &self.username)
            .field("scheme", &self.scheme())
            .field("locked", &self.is_locked())
            .finish()
    }
}
