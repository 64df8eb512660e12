//! Cryptographically secure randomness for salts, IVs and nonces.

use rand::{rngs::OsRng, RngCore};

use crate::symmetric::NONCE_LEN;

/// Salt length for password derivation and credential hashing.
pub const SALT_LEN: usize = 16;

/// Fill `buf` from the OS CSPRNG.
pub fn fill(buf: &mut [u8]) {
    OsRng.fill_bytes(buf);
}

/// `N` random bytes.
pub fn bytes<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    OsRng.fill_bytes(&mut out);
    out
}

/// Fresh 96-bit AEAD nonce. One per encryption, never reused.
pub fn nonce() -> [u8; NONCE_LEN] {
    bytes()
}

/// Fresh per-user salt.
pub fn salt() -> [u8; SALT_LEN] {
    bytes()
}
