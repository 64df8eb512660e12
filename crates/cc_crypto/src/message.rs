//! Per-message encryption
//!
//! Agreement mode: AES-256-GCM under the session key with a fresh 96-bit
//! nonce drawn for every message.
//!
//! Direct mode: RSA-OAEP(SHA-256) under the recipient's public key. No
//! nonce; OAEP randomises internally. Plaintext is capped at
//! `k - 2*hLen - 2` bytes (190 for a 2048-bit modulus).

use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::encoding::{b64, b64_opt};
use crate::error::{CryptoError, CryptoResult};
use crate::random;
use crate::symmetric::{self, SymmetricKey, NONCE_LEN};

const MESSAGE_AAD: &[u8] = b"cc-message-v1";

/// What gets handed to the transport. `nonce` is absent in direct mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCiphertext {
    #[serde(with = "b64")]
    pub ciphertext: Vec<u8>,
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<[u8; NONCE_LEN]>,
}

pub fn encrypt_message(message: &str, key: &SymmetricKey) -> CryptoResult<MessageCiphertext> {
    let nonce = random::nonce();
    let ciphertext = symmetric::seal(key, &nonce, message.as_bytes(), MESSAGE_AAD)?;
    Ok(MessageCiphertext {
        ciphertext,
        nonce: Some(nonce),
    })
}

pub fn decrypt_message(
    key: &SymmetricKey,
    nonce: &[u8; NONCE_LEN],
    ciphertext: &[u8],
) -> CryptoResult<String> {
    let plaintext = symmetric::open(key, nonce, ciphertext, MESSAGE_AAD)?;
    utf8(&plaintext)
}

/// Largest plaintext (bytes) `encrypt_direct` accepts for this key.
pub fn direct_capacity(key: &RsaPublicKey) -> usize {
    key.size()
        .saturating_sub(2 * <Sha256 as Digest>::output_size() + 2)
}

pub fn encrypt_direct(message: &str, remote: &RsaPublicKey) -> CryptoResult<MessageCiphertext> {
    let max = direct_capacity(remote);
    let len = message.len();
    if len > max {
        return Err(CryptoError::PayloadTooLarge { len, max });
    }
    let ciphertext = remote
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), message.as_bytes())
        .map_err(|_| CryptoError::Encryption)?;
    Ok(MessageCiphertext {
        ciphertext,
        nonce: None,
    })
}

pub fn decrypt_direct(ciphertext: &[u8], local: &RsaPrivateKey) -> CryptoResult<String> {
    let plaintext = local
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Decryption)?;
    utf8(&plaintext)
}

fn utf8(bytes: &[u8]) -> CryptoResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| CryptoError::Corrupted("message is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair::{KeyPair, PrivateKey, PublicKey, Scheme};

    fn rsa_pair() -> (RsaPrivateKey, RsaPublicKey) {
        let pair = KeyPair::generate(Scheme::Direct).unwrap();
        match (pair.private, pair.public) {
            (PrivateKey::Direct(sk), PublicKey::Direct(pk)) => (sk, pk),
            _ => unreachable!(),
        }
    }

    #[test]
    fn nonce_is_fresh_per_message() {
        let key = SymmetricKey::generate();
        let a = encrypt_message("same", &key).unwrap();
        let b = encrypt_message("same", &key).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn tampered_tag_is_rejected() {
        let key = SymmetricKey::generate();
        let mut ct = encrypt_message("hello", &key).unwrap();
        let last = ct.ciphertext.len() - 1;
        ct.ciphertext[last] ^= 0x80;
        let nonce = ct.nonce.unwrap();
        assert!(matches!(
            decrypt_message(&key, &nonce, &ct.ciphertext),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn direct_roundtrip_and_ceiling() {
        let (sk, pk) = rsa_pair();
        assert_eq!(direct_capacity(&pk), 190);

        let max = "x".repeat(190);
        let ct = encrypt_direct(&max, &pk).unwrap();
        assert!(ct.nonce.is_none());
        assert_eq!(decrypt_direct(&ct.ciphertext, &sk).unwrap(), max);

        let err = encrypt_direct(&"x".repeat(191), &pk).unwrap_err();
        assert!(matches!(err, CryptoError::PayloadTooLarge { len: 191, max: 190 }));
    }

    #[test]
    fn direct_with_wrong_private_key_fails() {
        let (_, pk) = rsa_pair();
        let (other_sk, _) = rsa_pair();
        let ct = encrypt_direct("secret", &pk).unwrap();
        assert!(matches!(
            decrypt_direct(&ct.ciphertext, &other_sk),
            Err(CryptoError::Decryption)
        ));
    }

    #[test]
    fn ciphertext_serialises_without_nonce_in_direct_mode() {
        let ct = MessageCiphertext {
            ciphertext: vec![1, 2, 3],
            nonce: None,
        };
        let json = serde_json::to_string(&ct).unwrap();
        assert_eq!(json, r#"{"ciphertext":"AQID"}"#);
        let back: MessageCiphertext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ct);
    }
}
