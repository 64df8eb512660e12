//! Per-peer message encryption over either key scheme.
//!
//! `SessionCipher::establish` inspects the local private key and the peer's
//! public key and returns the matching variant:
//!
//! - Agreement: ECDH(local, remote) → 32-byte x-coordinate → AES-256-GCM key.
//!   Both sides compute the same key without transmitting it.
//! - Direct: keep the local RSA private key for decryption and the peer's
//!   RSA public key for encryption.

use std::fmt;

use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::error::{CryptoError, CryptoResult};
use crate::keypair::{PrivateKey, PublicKey, Scheme};
use crate::message::{self, MessageCiphertext};
use crate::symmetric::SymmetricKey;

#[derive(Clone)]
pub enum SessionCipher {
    Agreement(SymmetricKey),
    Direct {
        local: RsaPrivateKey,
        remote: RsaPublicKey,
    },
}

/// P-256 ECDH, shared secret imported directly as the session key.
pub fn derive_session_key(local: &p256::SecretKey, remote: &p256::PublicKey) -> SymmetricKey {
    let shared = p256::ecdh::diffie_hellman(local.to_nonzero_scalar(), remote.as_affine());
    let mut key = [0u8; 32];
    key.copy_from_slice(shared.raw_secret_bytes().as_slice());
    let session_key = SymmetricKey::from_bytes(key);
    zeroize::Zeroize::zeroize(&mut key);
    session_key
}

impl SessionCipher {
    pub fn establish(local: &PrivateKey, remote: &PublicKey) -> CryptoResult<Self> {
        match (local, remote) {
            (PrivateKey::Agreement(sk), PublicKey::Agreement(pk)) => {
                Ok(SessionCipher::Agreement(derive_session_key(sk, pk)))
            }
            (PrivateKey::Direct(sk), PublicKey::Direct(pk)) => Ok(SessionCipher::Direct {
                local: sk.clone(),
                remote: pk.clone(),
            }),
            _ => Err(CryptoError::SchemeMismatch {
                local: local.scheme(),
                remote: remote.scheme(),
            }),
        }
    }

    pub fn scheme(&self) -> Scheme {
        match self {
            SessionCipher::Agreement(_) => Scheme::Agreement,
            SessionCipher::Direct { .. } => Scheme::Direct,
        }
    }

    /// The agreed key, if this is an agreement-mode session.
    pub fn session_key(&self) -> Option<&SymmetricKey> {
        match self {
            SessionCipher::Agreement(key) => Some(key),
            SessionCipher::Direct { .. } => None,
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<MessageCiphertext> {
        match self {
            SessionCipher::Agreement(key) => message::encrypt_message(plaintext, key),
            SessionCipher::Direct { remote, .. } => message::encrypt_direct(plaintext, remote),
        }
    }

    pub fn decrypt(&self, ct: &MessageCiphertext) -> CryptoResult<String> {
        match self {
            SessionCipher::Agreement(key) => {
                let nonce = ct
                    .nonce
                    .as_ref()
                    .ok_or_else(|| CryptoError::Corrupted("missing message nonce".into()))?;
                message::decrypt_message(key, nonce, &ct.ciphertext)
            }
            SessionCipher::Direct { local, .. } => message::decrypt_direct(&ct.ciphertext, local),
        }
    }
}

impl fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionCipher({}, <redacted>)", self.scheme())
    }
}
