//! Password-to-key derivation
//!
//! Consumers depend on the `PasswordKdf` trait, never on a concrete
//! function, so the store can run with a cheap stub in tests and with
//! Argon2id everywhere else.

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::symmetric::{SymmetricKey, KEY_LEN};

pub trait PasswordKdf: Send + Sync {
    /// Derive the 256-bit password key for `salt`. Must be deterministic.
    fn derive_key(&self, password: &[u8], salt: &[u8]) -> CryptoResult<SymmetricKey>;
}

/// Argon2id cost parameters. Defaults are tuned for interactive desktop use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024, // 64 MiB
            iterations: 3,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Argon2Kdf {
    params: Params,
}

impl Argon2Kdf {
    pub fn new(params: KdfParams) -> CryptoResult<Self> {
        let params = Params::new(
            params.memory_kib,
            params.iterations,
            params.parallelism,
            Some(KEY_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(format!("argon2 params: {e}")))?;
        Ok(Self { params })
    }
}

impl PasswordKdf for Argon2Kdf {
    fn derive_key(&self, password: &[u8], salt: &[u8]) -> CryptoResult<SymmetricKey> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut output = Zeroizing::new([0u8; KEY_LEN]);
        argon2
            .hash_password_into(password, salt, output.as_mut())
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(SymmetricKey::from_bytes(*output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap() -> Argon2Kdf {
        Argon2Kdf::new(KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .unwrap()
    }

    #[test]
    fn derivation_is_deterministic() {
        let kdf = cheap();
        let a = kdf.derive_key(b"pw", b"0123456789abcdef").unwrap();
        let b = kdf.derive_key(b"pw", b"0123456789abcdef").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn salt_and_password_change_the_key() {
        let kdf = cheap();
        let base = kdf.derive_key(b"pw", b"0123456789abcdef").unwrap();
        assert_ne!(base, kdf.derive_key(b"pw", b"fedcba9876543210").unwrap());
        assert_ne!(base, kdf.derive_key(b"pW", b"0123456789abcdef").unwrap());
    }

    #[test]
    fn short_salt_is_rejected() {
        let err = cheap().derive_key(b"pw", b"abc").unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }

    #[test]
    fn invalid_params_are_rejected() {
        let err = Argon2Kdf::new(KdfParams {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        })
        .unwrap_err();
        assert!(matches!(err, CryptoError::KeyDerivation(_)));
    }
}
