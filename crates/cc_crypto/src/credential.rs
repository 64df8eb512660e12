//! Stored login credentials and password rules.
//!
//! A credential is `SHA-256(password ‖ salt)` with a 16-byte per-user salt.
//! Verification recomputes the digest and compares the full 32 bytes in
//! constant time.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::encoding::b64;
use crate::error::{CryptoError, CryptoResult};
use crate::random::{self, SALT_LEN};

pub const DIGEST_LEN: usize = 32;

pub fn hash_credential(password: &str, salt: &[u8]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt);
    hasher.finalize().into()
}

/// A stored digest of the wrong length never matches.
pub fn verify_credential(password: &str, stored_digest: &[u8], stored_salt: &[u8]) -> bool {
    if stored_digest.len() != DIGEST_LEN {
        return false;
    }
    let computed = hash_credential(password, stored_salt);
    computed[..].ct_eq(stored_digest).into()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    #[serde(with = "b64")]
    pub hash: [u8; DIGEST_LEN],
    #[serde(with = "b64")]
    pub salt: [u8; SALT_LEN],
}

impl Credential {
    /// Hash `password` under a freshly drawn salt.
    pub fn new(password: &str) -> Self {
        let salt = random::salt();
        Self {
            hash: hash_credential(password, &salt),
            salt,
        }
    }

    pub fn verify(&self, password: &str) -> bool {
        verify_credential(password, &self.hash, &self.salt)
    }
}

// ── Password policy ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub require_upper: bool,
    pub require_lower: bool,
    pub require_digit: bool,
    pub require_symbol: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: 8,
            require_upper: true,
            require_lower: true,
            require_digit: true,
            require_symbol: true,
        }
    }
}

impl PasswordPolicy {
    /// Checks rules in order and reports the first one that fails.
    pub fn validate(&self, password: &str) -> CryptoResult<()> {
        let weak = |reason: String| Err(CryptoError::WeakPassword(reason));

        if password.chars().count() < self.min_length {
            return weak(format!("must be at least {} characters", self.min_length));
        }
        if self.require_upper && !password.chars().any(char::is_uppercase) {
            return weak("must contain an uppercase letter".into());
        }
        if self.require_lower && !password.chars().any(char::is_lowercase) {
            return weak("must contain a lowercase letter".into());
        }
        if self.require_digit && !password.chars().any(|c| c.is_ascii_digit()) {
            return weak("must contain a digit".into());
        }
        if self.require_symbol && !password.chars().any(|c| !c.is_alphanumeric()) {
            return weak("must contain a symbol".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_vectors() {
        assert_eq!(
            hex::encode(hash_credential("password", b"salt")),
            "7a37b85c8918eac19a9089c0fa5a2ab4dce3f90528dcdeec108b23ddf3607b99"
        );
        assert_eq!(
            hex::encode(hash_credential("hunter2", b"NaCl")),
            "7028028ca3a72cca7aafd8f1390c079f4df54422c6e1784bc2b45751cd1d4d04"
        );
        assert_eq!(
            hex::encode(hash_credential("", b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn verify_accepts_right_and_rejects_wrong() {
        let digest = hash_credential("Correct-h0rse", b"0123456789abcdef");
        assert!(verify_credential("Correct-h0rse", &digest, b"0123456789abcdef"));
        assert!(!verify_credential("correct-h0rse", &digest, b"0123456789abcdef"));
        assert!(!verify_credential("Correct-h0rse", &digest, b"fedcba9876543210"));
    }

    #[test]
    fn truncated_digest_never_matches() {
        let digest = hash_credential("pw", b"salt");
        assert!(!verify_credential("pw", &digest[..31], b"salt"));
        assert!(!verify_credential("pw", &[], b"salt"));
    }

    #[test]
    fn credential_salts_differ() {
        let a = Credential::new("same password");
        let b = Credential::new("same password");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
        assert!(a.verify("same password"));
        assert!(!a.verify("other password"));
    }

    #[test]
    fn credential_serialises_as_base64() {
        let cred = Credential::new("pw");
        let json = serde_json::to_value(&cred).unwrap();
        assert!(json["hash"].is_string());
        let back: Credential = serde_json::from_value(json).unwrap();
        assert_eq!(back, cred);
    }

    #[test]
    fn policy_reports_first_unmet_rule() {
        let policy = PasswordPolicy::default();
        let reason = |pw: &str| match policy.validate(pw) {
            Err(CryptoError::WeakPassword(r)) => r,
            other => panic!("expected WeakPassword, got {other:?}"),
        };
        assert!(reason("Ab1!").contains("at least 8"));
        assert!(reason("abcdefg1!").contains("uppercase"));
        assert!(reason("ABCDEFG1!").contains("lowercase"));
        assert!(reason("Abcdefgh!").contains("digit"));
        assert!(reason("Abcdefgh1").contains("symbol"));
        assert!(policy.validate("Abcdefg1!").is_ok());
    }

    #[test]
    fn relaxed_policy() {
        let policy = PasswordPolicy {
            min_length: 4,
            require_upper: false,
            require_lower: false,
            require_digit: false,
            require_symbol: false,
        };
        assert!(policy.validate("abcd").is_ok());
        assert!(policy.validate("abc").is_err());
    }
}
