//! Authenticated symmetric encryption
//!
//! AES-256-GCM. Key: 32 bytes. Nonce: 12 bytes (random, drawn per call by
//! the higher-level modules). Tag: 16 bytes, appended to the ciphertext.

use std::fmt;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::error::{CryptoError, CryptoResult};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// 256-bit AEAD key (password-derived or agreed). Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey([u8; KEY_LEN]);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidKey(format!(
                "symmetric key must be {KEY_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Random key for fixtures. Real keys come from the KDF or key agreement.
    #[cfg(any(test, feature = "test-util"))]
    pub fn generate() -> Self {
        Self(crate::random::bytes())
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl PartialEq for SymmetricKey {
    fn eq(&self, other: &Self) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for SymmetricKey {}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(<redacted>)")
    }
}

/// Encrypt `plaintext` under `key`/`nonce`; returns ciphertext || tag.
pub fn seal(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
    plaintext: &[u8],
    aad: &[u8],
) -> CryptoResult<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Encryption)?;
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::Encryption)
}

/// Decrypt ciphertext || tag. Any mismatch (key, nonce, aad, bytes) is a
/// `Decryption` error; no plaintext is released.
pub fn open(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
    aad: &[u8],
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    if ciphertext.len() < TAG_LEN {
        return Err(CryptoError::Decryption);
    }
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CryptoError::Decryption)?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::Decryption)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = SymmetricKey::generate();
        let nonce = crate::random::nonce();
        let ct = seal(&key, &nonce, b"payload", b"aad").unwrap();
        assert_eq!(ct.len(), b"payload".len() + TAG_LEN);
        let pt = open(&key, &nonce, &ct, b"aad").unwrap();
        assert_eq!(pt.as_slice(), b"payload");
    }

    #[test]
    fn wrong_aad_is_rejected() {
        let key = SymmetricKey::generate();
        let nonce = crate::random::nonce();
        let ct = seal(&key, &nonce, b"payload", b"aad-1").unwrap();
        assert!(matches!(
            open(&key, &nonce, &ct, b"aad-2"),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let key = SymmetricKey::generate();
        let nonce = crate::random::nonce();
        assert!(matches!(
            open(&key, &nonce, &[0u8; 4], b""),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(SymmetricKey::from_slice(&[0u8; 31]).is_err());
        assert!(SymmetricKey::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn debug_does_not_leak_key() {
        let key = SymmetricKey::from_bytes([0xAB; 32]);
        assert!(!format!("{key:?}").contains("171"));
    }
}
