//! Private-key wrapping under a password-derived key.
//!
//! The private key is exported as PKCS#8 DER and sealed with AES-256-GCM.
//! The IV is drawn here for every wrap and travels with the blob, so two
//! wraps under the same password key never share an IV. The scheme is bound
//! into the associated data; unwrapping under the wrong scheme fails
//! authentication instead of mis-parsing.

use serde::{Deserialize, Serialize};

use crate::encoding::b64;
use crate::error::{CryptoError, CryptoResult};
use crate::keypair::{PrivateKey, Scheme};
use crate::random;
use crate::symmetric::{self, SymmetricKey, NONCE_LEN};

const KEY_WRAP_AAD: &str = "cc-key-wrap-v1";

fn wrap_aad(scheme: Scheme) -> Vec<u8> {
    format!("{KEY_WRAP_AAD}:{scheme}").into_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    #[serde(with = "b64")]
    pub iv: [u8; NONCE_LEN],
    /// AES-256-GCM ciphertext + tag over the PKCS#8 DER.
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

pub fn wrap_private_key(key: &PrivateKey, password_key: &SymmetricKey) -> CryptoResult<WrappedKey> {
    let der = key.to_pkcs8_der()?;
    let iv = random::nonce();
    let ciphertext = symmetric::seal(password_key, &iv, &der, &wrap_aad(key.scheme()))?;
    Ok(WrappedKey { iv, ciphertext })
}

/// `Decryption` means the password key, IV or blob is wrong; `Corrupted`
/// means the blob authenticated but does not hold a usable key.
pub fn unwrap_private_key(
    wrapped: &WrappedKey,
    password_key: &SymmetricKey,
    scheme: Scheme,
) -> CryptoResult<PrivateKey> {
    let der = symmetric::open(password_key, &wrapped.iv, &wrapped.ciphertext, &wrap_aad(scheme))?;
    PrivateKey::from_pkcs8_der(scheme, &der).map_err(|e| CryptoError::Corrupted(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::KeyPair;

    #[test]
    fn wrap_unwrap_roundtrip() {
        let pair = KeyPair::generate(Scheme::Agreement).unwrap();
        let pk = SymmetricKey::generate();
        let wrapped = wrap_private_key(&pair.private, &pk).unwrap();
        let restored = unwrap_private_key(&wrapped, &pk, Scheme::Agreement).unwrap();
        assert_eq!(restored.public_key(), pair.public);
    }

    #[test]
    fn every_wrap_draws_a_new_iv() {
        let pair = KeyPair::generate(Scheme::Agreement).unwrap();
        let pk = SymmetricKey::generate();
        let a = wrap_private_key(&pair.private, &pk).unwrap();
        let b = wrap_private_key(&pair.private, &pk).unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_password_key_fails_decryption() {
        let pair = KeyPair::generate(Scheme::Agreement).unwrap();
        let wrapped = wrap_private_key(&pair.private, &SymmetricKey::generate()).unwrap();
        let err = unwrap_private_key(&wrapped, &SymmetricKey::generate(), Scheme::Agreement)
            .unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn wrong_iv_fails_decryption() {
        let pair = KeyPair::generate(Scheme::Agreement).unwrap();
        let pk = SymmetricKey::generate();
        let mut wrapped = wrap_private_key(&pair.private, &pk).unwrap();
        wrapped.iv[0] ^= 0x01;
        assert!(matches!(
            unwrap_private_key(&wrapped, &pk, Scheme::Agreement),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn scheme_is_authenticated() {
        let pair = KeyPair::generate(Scheme::Agreement).unwrap();
        let pk = SymmetricKey::generate();
        let wrapped = wrap_private_key(&pair.private, &pk).unwrap();
        assert!(matches!(
            unwrap_private_key(&wrapped, &pk, Scheme::Direct),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn authenticated_garbage_is_reported_as_corruption() {
        let pk = SymmetricKey::generate();
        let iv = random::nonce();
        let ciphertext =
            symmetric::seal(&pk, &iv, b"not a pkcs8 document", &wrap_aad(Scheme::Agreement))
                .unwrap();
        let wrapped = WrappedKey { iv, ciphertext };
        assert!(matches!(
            unwrap_private_key(&wrapped, &pk, Scheme::Agreement),
            Err(CryptoError::Corrupted(_))
        ));
    }
}
