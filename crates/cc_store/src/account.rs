//! Account lifecycle: register, log in, change password.
//!
//! An account is three records under the username: the key pair (private
//! half wrapped under the password key), the sealed history and the login
//! credential. Flows that touch more than one of them hold the account lock
//! for their whole span.

use std::sync::Arc;

use cc_crypto::random::{self, SALT_LEN};
use cc_crypto::{
    open_history, seal_history, unwrap_private_key, wrap_private_key, Argon2Kdf, Credential,
    KeyPair, PasswordKdf, PasswordPolicy, PrivateKey, PublicKey, Scheme, SymmetricKey,
};
use tracing::{info, warn};
use zeroize::Zeroizing;

use crate::config::KeyringConfig;
use crate::error::{StoreError, StoreResult};
use crate::kv::{KvStore, KEYS};
use crate::locks::{LockedStore, RecordGuard, RecordLocks};
use crate::models::{KeyPairRecord, MessageHistory};
use crate::repo;
use crate::session::Session;

/// Lock scope for multi-record account flows.
pub const ACCOUNT_SCOPE: &str = "account";

/// Cheap to clone; clones share the store, lock arena and KDF.
#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn KvStore>,
    locks: RecordLocks,
    kdf: Arc<dyn PasswordKdf>,
    policy: PasswordPolicy,
}

impl Accounts {
    /// `store` is wrapped in a `LockedStore` sharing this instance's lock
    /// arena.
    pub fn new<S: KvStore + 'static>(store: S, kdf: Arc<dyn PasswordKdf>) -> Self {
        let locks = RecordLocks::new();
        Self {
            store: Arc::new(LockedStore::with_locks(store, locks.clone())),
            locks,
            kdf,
            policy: PasswordPolicy::default(),
        }
    }

    pub fn from_config<S: KvStore + 'static>(store: S, config: &KeyringConfig) -> StoreResult<Self> {
        let kdf = Argon2Kdf::new(config.kdf)?;
        Ok(Self::new(store, Arc::new(kdf)).with_policy(config.password_policy.clone()))
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    pub fn locks(&self) -> &RecordLocks {
        &self.locks
    }

    pub(crate) async fn lock_account(&self, username: &str) -> RecordGuard {
        self.locks.acquire(ACCOUNT_SCOPE, username).await
    }

    /// Argon2 is CPU bound; run it off the async workers.
    pub(crate) async fn derive_key(
        &self,
        password: &str,
        salt: [u8; SALT_LEN],
    ) -> StoreResult<SymmetricKey> {
        let kdf = self.kdf.clone();
        let password = Zeroizing::new(password.as_bytes().to_vec());
        let key = tokio::task::spawn_blocking(move || kdf.derive_key(&password, &salt)).await??;
        Ok(key)
    }

    pub async fn exists(&self, username: &str) -> StoreResult<bool> {
        match self.store.get(KEYS, username).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn public_key(&self, username: &str) -> StoreResult<PublicKey> {
        let record = repo::load_key_pair(self.store(), username).await?;
        record
            .public_key()
            .map_err(|_| StoreError::Integrity(username.to_string()))
    }

    /// Create the key pair, an empty sealed history and the credential.
    ///
    /// `exists` only reports true once all three are written; a store error
    /// part way through can be retried.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        scheme: Scheme,
    ) -> StoreResult<PublicKey> {
        if username.is_empty() {
            return Err(StoreError::Malformed {
                collection: KEYS.to_string(),
                id: String::new(),
                reason: "username must not be empty".into(),
            });
        }
        self.policy.validate(password)?;
        let _guard = self.lock_account(username).await;
        if self.exists(username).await? {
            return Err(StoreError::AlreadyExists {
                collection: KEYS.to_string(),
                id: username.to_string(),
            });
        }

        let salt = random::salt();
        let password_key = self.derive_key(password, salt).await?;
        let pair = tokio::task::spawn_blocking(move || KeyPair::generate(scheme)).await??;

        let wrapped = wrap_private_key(&pair.private, &password_key)?;
        let key_record = KeyPairRecord::new(username, &pair.public, wrapped, salt)?;
        let sealed = seal_history(&MessageHistory::new(), &password_key)?;

        // The key record marks the account as existing, so it goes last. A
        // failed attempt leaves only rows that the next attempt overwrites.
        repo::store_history(self.store(), username, sealed).await?;
        repo::store_credential(self.store(), username, Credential::new(password)).await?;
        repo::insert_key_pair(self.store(), &key_record).await?;

        info!(username, %scheme, "registered account");
        Ok(pair.public)
    }

    /// Check the credential, then unwrap the private key into a `Session`.
    ///
    /// Holds the account lock so a concurrent password change is seen either
    /// entirely or not at all.
    pub async fn login(&self, username: &str, password: &str) -> StoreResult<Session> {
        let (private, password_key, salt) = {
            let _guard = self.lock_account(username).await;
            self.check_credential(username, password).await?;
            self.unlock_key(username, password).await?
        };
        info!(username, scheme = %private.scheme(), "logged in");
        Ok(Session::new(self.clone(), username, private, password_key, salt))
    }

    /// Rotate the derivation salt, re-wrap the private key, re-seal the
    /// history and replace the credential, all under the account lock.
    pub async fn change_password(
        &self,
        username: &str,
        old_password: &str,
        new_password: &str,
    ) -> StoreResult<()> {
        self.policy.validate(new_password)?;
        let _guard = self.lock_account(username).await;

        self.check_credential(username, old_password).await?;
        let (private, old_key, _) = self.unlock_key(username, old_password).await?;

        let history: MessageHistory = match repo::load_history(self.store(), username).await? {
            Some(sealed) => open_history(&sealed, &old_key).map_err(|e| {
                warn!(username, error = %e, "stored history failed to open");
                StoreError::Integrity(username.to_string())
            })?,
            None => MessageHistory::new(),
        };

        let salt = random::salt();
        let new_key = self.derive_key(new_password, salt).await?;
        let wrapped = wrap_private_key(&private, &new_key)?;
        let sealed = seal_history(&history, &new_key)?;

        repo::rewrap_key_pair(self.store(), username, wrapped, salt).await?;
        repo::store_history(self.store(), username, sealed).await?;
        repo::replace_credential(self.store(), username, Credential::new(new_password)).await?;

        info!(username, "password changed");
        Ok(())
    }

    async fn check_credential(&self, username: &str, password: &str) -> StoreResult<()> {
        let credential = match repo::load_credential(self.store(), username).await {
            Ok(c) => c,
            Err(StoreError::NotFound { .. }) => {
                warn!(username, "login for unknown account");
                return Err(StoreError::WrongPassword);
            }
            Err(e) => return Err(e),
        };
        if !credential.verify(password) {
            warn!(username, "credential check failed");
            return Err(StoreError::WrongPassword);
        }
        Ok(())
    }

    /// Derive the password key and unwrap the stored private key. Runs after
    /// the credential check, so a failure here means the record is damaged.
    async fn unlock_key(
        &self,
        username: &str,
        password: &str,
    ) -> StoreResult<(PrivateKey, SymmetricKey, [u8; SALT_LEN])> {
        let record = match repo::load_key_pair(self.store(), username).await {
            Ok(record) => record,
            // Credential left behind by a registration that never finished.
            Err(StoreError::NotFound { .. }) => {
                warn!(username, "credential without key record");
                return Err(StoreError::WrongPassword);
            }
            Err(e) => return Err(e),
        };
        let password_key = self.derive_key(password, record.salt).await?;

        let private = unwrap_private_key(&record.wrapped(), &password_key, record.scheme)
            .map_err(|e| {
                warn!(username, error = %e, "private key failed to unwrap");
                StoreError::Integrity(username.to_string())
            })?;

        let stored_public = record
            .public_key()
            .map_err(|_| StoreError::Integrity(username.to_string()))?;
        if private.public_key() != stored_public {
            warn!(username, "unwrapped key does not match stored public key");
            return Err(StoreError::Integrity(username.to_string()));
        }

        Ok((private, password_key, record.salt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use cc_crypto::KdfParams;

    fn accounts() -> Accounts {
        let kdf = Argon2Kdf::new(KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap();
        Accounts::new(MemoryStore::new(), Arc::new(kdf))
    }

    #[tokio::test]
    async fn weak_password_is_rejected_before_any_write() {
        let accounts = accounts();
        let err = accounts
            .register("alice", "short", Scheme::Agreement)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Crypto(cc_crypto::CryptoError::WeakPassword(_))
        ));
        assert!(!accounts.exists("alice").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_registration_fails() {
        let accounts = accounts();
        accounts
            .register("alice", "Str0ng!pass", Scheme::Agreement)
            .await
            .unwrap();
        let err = accounts
            .register("alice", "Other-Pass1", Scheme::Agreement)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn unknown_user_and_wrong_password_look_the_same() {
        let accounts = accounts();
        accounts
            .register("alice", "Str0ng!pass", Scheme::Agreement)
            .await
            .unwrap();
        assert!(matches!(
            accounts.login("alice", "Wr0ng!pass").await,
            Err(StoreError::WrongPassword)
        ));
        assert!(matches!(
            accounts.login("mallory", "Str0ng!pass").await,
            Err(StoreError::WrongPassword)
        ));
    }

    #[tokio::test]
    async fn tampered_key_record_is_an_integrity_error() {
        let accounts = accounts();
        accounts
            .register("alice", "Str0ng!pass", Scheme::Agreement)
            .await
            .unwrap();

        let mut record = repo::load_key_pair(accounts.store(), "alice").await.unwrap();
        record.encrypted_private_key[0] ^= 0xff;
        let fields =
            crate::kv::fields_of(&record, &KeyPairRecord::WRAP_FIELDS).unwrap();
        accounts
            .store()
            .upsert_fields(KEYS, "alice", fields)
            .await
            .unwrap();

        assert!(matches!(
            accounts.login("alice", "Str0ng!pass").await,
            Err(StoreError::Integrity(_))
        ));
    }

    #[tokio::test]
    async fn empty_username_is_rejected() {
        let err = accounts()
            .register("", "Str0ng!pass", Scheme::Agreement)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Malformed { .. }));
    }
}
