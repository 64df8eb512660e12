//! Asymmetric key pairs
//!
//! Two schemes, chosen once when the pair is generated and persisted with
//! the key record:
//!
//! - `Scheme::Agreement`: ECDH over P-256. Both parties derive the same
//!   session key from (own private, peer public).
//! - `Scheme::Direct`: RSA-2048, e = 65537, OAEP/SHA-256. Each message is
//!   encrypted straight to the peer's public key.
//!
//! Interchange encodings: SPKI DER for public keys, PKCS#8 DER for private
//! keys (the form that gets wrapped by `wrap`).

use std::fmt;
use std::str::FromStr;

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};

pub const RSA_MODULUS_BITS: usize = 2048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scheme {
    /// P-256 Diffie-Hellman key agreement.
    Agreement,
    /// RSA-OAEP public-key encryption per message.
    Direct,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Agreement => "agreement",
            Scheme::Direct => "direct",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agreement" | "dh" | "ecdh" => Ok(Scheme::Agreement),
            "direct" | "rsa" => Ok(Scheme::Direct),
            other => Err(CryptoError::InvalidKey(format!("unknown key scheme '{other}'"))),
        }
    }
}

// ── Public key ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    Agreement(p256::PublicKey),
    Direct(RsaPublicKey),
}

impl PublicKey {
    pub fn scheme(&self) -> Scheme {
        match self {
            PublicKey::Agreement(_) => Scheme::Agreement,
            PublicKey::Direct(_) => Scheme::Direct,
        }
    }

    /// SPKI DER encoding.
    pub fn to_der(&self) -> CryptoResult<Vec<u8>> {
        let doc = match self {
            PublicKey::Agreement(pk) => pk.to_public_key_der(),
            PublicKey::Direct(pk) => pk.to_public_key_der(),
        }
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(doc.as_bytes().to_vec())
    }

    pub fn from_der(scheme: Scheme, der: &[u8]) -> CryptoResult<Self> {
        match scheme {
            Scheme::Agreement => p256::PublicKey::from_public_key_der(der)
                .map(PublicKey::Agreement)
                .map_err(|e| CryptoError::InvalidKey(format!("P-256 public key: {e}"))),
            Scheme::Direct => RsaPublicKey::from_public_key_der(der)
                .map(PublicKey::Direct)
                .map_err(|e| CryptoError::InvalidKey(format!("RSA public key: {e}"))),
        }
    }

    pub fn to_b64(&self) -> CryptoResult<String> {
        Ok(encoding::encode(self.to_der()?))
    }

    pub fn from_b64(scheme: Scheme, s: &str) -> CryptoResult<Self> {
        Self::from_der(scheme, &encoding::decode(s)?)
    }

    /// Human-readable fingerprint: BLAKE3 of the SPKI DER, truncated to
    /// 20 bytes, hex in groups of 4. Compared out of band by users.
    pub fn fingerprint(&self) -> CryptoResult<String> {
        let hash = blake3::hash(&self.to_der()?);
        let hex = hex::encode(&hash.as_bytes()[..20]);
        Ok(hex
            .as_bytes()
            .chunks(4)
            .map(|c| String::from_utf8_lossy(c).into_owned())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

// ── Private key ───────────────────────────────────────────────────────────────

/// Private half. Both variants zeroize their secret on drop.
#[derive(Clone)]
pub enum PrivateKey {
    Agreement(p256::SecretKey),
    Direct(RsaPrivateKey),
}

impl PrivateKey {
    pub fn scheme(&self) -> Scheme {
        match self {
            PrivateKey::Agreement(_) => Scheme::Agreement,
            PrivateKey::Direct(_) => Scheme::Direct,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        match self {
            PrivateKey::Agreement(sk) => PublicKey::Agreement(sk.public_key()),
            PrivateKey::Direct(sk) => PublicKey::Direct(sk.to_public_key()),
        }
    }

    /// PKCS#8 DER encoding. The buffer is wiped when dropped.
    pub fn to_pkcs8_der(&self) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let doc = match self {
            PrivateKey::Agreement(sk) => sk.to_pkcs8_der(),
            PrivateKey::Direct(sk) => sk.to_pkcs8_der(),
        }
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    pub fn from_pkcs8_der(scheme: Scheme, der: &[u8]) -> CryptoResult<Self> {
        match scheme {
            Scheme::Agreement => p256::SecretKey::from_pkcs8_der(der)
                .map(PrivateKey::Agreement)
                .map_err(|e| CryptoError::InvalidKey(format!("P-256 private key: {e}"))),
            Scheme::Direct => RsaPrivateKey::from_pkcs8_der(der)
                .map(PrivateKey::Direct)
                .map_err(|e| CryptoError::InvalidKey(format!("RSA private key: {e}"))),
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({}, <redacted>)", self.scheme())
    }
}

// ── Key pair ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    pub fn generate(scheme: Scheme) -> CryptoResult<Self> {
        let private = match scheme {
            Scheme::Agreement => PrivateKey::Agreement(p256::SecretKey::random(&mut OsRng)),
            Scheme::Direct => {
                let sk = RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
                    .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
                sk.validate()
                    .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
                PrivateKey::Direct(sk)
            }
        };
        Ok(Self {
            public: private.public_key(),
            private,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.private.scheme()
    }
}
