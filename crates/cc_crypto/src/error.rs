use thiserror::Error;

use crate::keypair::Scheme;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Decryption failed (authentication tag mismatch: wrong key or tampered data)")]
    Decryption,

    #[error("Authenticated data is corrupted: {0}")]
    Corrupted(String),

    #[error("Payload of {len} bytes exceeds the direct-mode limit of {max} bytes")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Key scheme mismatch: local key is {local}, remote key is {remote}")]
    SchemeMismatch { local: Scheme, remote: Scheme },

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Password rejected: {0}")]
    WeakPassword(String),

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

pub type CryptoResult<T> = Result<T, CryptoError>;
