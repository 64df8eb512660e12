//! Whole-history sealing under the password-derived key.
//!
//! The history is serialised to JSON and sealed as a single AES-256-GCM
//! blob. There is no incremental mode: every save re-encrypts everything
//! under a new IV. Callers should use ordered maps in their history types
//! so the encoding is canonical.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::encoding::b64;
use crate::error::{CryptoError, CryptoResult};
use crate::random;
use crate::symmetric::{self, SymmetricKey, NONCE_LEN};

const HISTORY_AAD: &[u8] = b"cc-history-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedHistory {
    #[serde(with = "b64")]
    pub iv: [u8; NONCE_LEN],
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
}

pub fn seal_history<T: Serialize>(
    history: &T,
    password_key: &SymmetricKey,
) -> CryptoResult<SealedHistory> {
    let plaintext = Zeroizing::new(serde_json::to_vec(history)?);
    let iv = random::nonce();
    let ciphertext = symmetric::seal(password_key, &iv, &plaintext, HISTORY_AAD)?;
    Ok(SealedHistory { iv, ciphertext })
}

/// `Decryption` for a wrong key or tampered blob, `Corrupted` when the blob
/// authenticates but is not a valid history.
pub fn open_history<T: DeserializeOwned>(
    sealed: &SealedHistory,
    password_key: &SymmetricKey,
) -> CryptoResult<T> {
    let plaintext = symmetric::open(password_key, &sealed.iv, &sealed.ciphertext, HISTORY_AAD)?;
    serde_json::from_slice(&plaintext).map_err(|e| CryptoError::Corrupted(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Rooms(BTreeMap<String, Vec<String>>);

    fn sample() -> Rooms {
        let mut rooms = BTreeMap::new();
        rooms.insert("general".to_string(), vec!["hi".to_string(), "hey".to_string()]);
        rooms.insert("alice".to_string(), vec!["secret".to_string()]);
        Rooms(rooms)
    }

    #[test]
    fn seal_open_roundtrip() {
        let key = SymmetricKey::generate();
        let sealed = seal_history(&sample(), &key).unwrap();
        let opened: Rooms = open_history(&sealed, &key).unwrap();
        assert_eq!(opened, sample());
    }

    #[test]
    fn each_seal_uses_a_new_iv() {
        let key = SymmetricKey::generate();
        let a = seal_history(&sample(), &key).unwrap();
        let b = seal_history(&sample(), &key).unwrap();
        assert_ne!(a.iv, b.iv);
    }

    #[test]
    fn wrong_key_is_a_decryption_failure() {
        let sealed = seal_history(&sample(), &SymmetricKey::generate()).unwrap();
        let err = open_history::<Rooms>(&sealed, &SymmetricKey::generate()).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn shape_mismatch_is_corruption() {
        let key = SymmetricKey::generate();
        let sealed = seal_history(&"just a string", &key).unwrap();
        let err = open_history::<Rooms>(&sealed, &key).unwrap_err();
        assert!(matches!(err, CryptoError::Corrupted(_)));
    }
}
