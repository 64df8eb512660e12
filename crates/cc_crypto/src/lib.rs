//! cc_crypto: Cipher Chat key-management primitives
//!
//! # Design principles
//! - NO custom crypto; all primitives come from audited RustCrypto crates.
//! - Secret key material is zeroized on drop.
//! - IVs and nonces are drawn by the function that consumes them; callers
//!   never supply one.
//!
//! # Module layout
//! - `random`      OS CSPRNG helpers (salts, IVs, nonces)
//! - `symmetric`   AES-256-GCM key type + seal/open
//! - `keypair`     P-256 (agreement) / RSA-2048 (direct) key pairs
//! - `wrap`        password-key wrapping of private keys
//! - `exchange`    per-peer `SessionCipher` over both schemes
//! - `message`     per-message encryption
//! - `history`     whole-history sealing
//! - `credential`  salted SHA-256 credentials + password policy
//! - `kdf`         injected password-to-key derivation (Argon2id default)
//! - `encoding`    base64 helpers and serde adapters
//! - `error`       unified error type

pub mod credential;
pub mod encoding;
pub mod error;
pub mod exchange;
pub mod history;
pub mod kdf;
pub mod keypair;
pub mod message;
pub mod random;
pub mod symmetric;
pub mod wrap;

pub use credential::{hash_credential, verify_credential, Credential, PasswordPolicy};
pub use error::{CryptoError, CryptoResult};
pub use exchange::SessionCipher;
pub use history::{open_history, seal_history, SealedHistory};
pub use kdf::{Argon2Kdf, KdfParams, PasswordKdf};
pub use keypair::{KeyPair, PrivateKey, PublicKey, Scheme};
pub use message::{decrypt_message, encrypt_message, MessageCiphertext};
pub use symmetric::{SymmetricKey, NONCE_LEN};
pub use wrap::{unwrap_private_key, wrap_private_key, WrappedKey};
