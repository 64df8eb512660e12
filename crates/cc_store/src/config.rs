//! Keyring configuration, stored as JSON. Every field has a default, so a
//! missing file or a partial one is fine.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use cc_crypto::{KdfParams, PasswordPolicy, Scheme};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::StoreResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringConfig {
    pub kdf: KdfParams,
    /// Scheme for newly registered accounts.
    pub default_scheme: Scheme,
    pub password_policy: PasswordPolicy,
    /// SQLite file. Falls back to the platform data directory when unset.
    pub database: Option<PathBuf>,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            default_scheme: Scheme::Agreement,
            password_policy: PasswordPolicy::default(),
            database: None,
        }
    }
}

impl KeyringConfig {
    pub fn load(path: &Path) -> StoreResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = KeyringConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg, KeyringConfig::default());
        assert_eq!(cfg.kdf.memory_kib, 64 * 1024);
        assert_eq!(cfg.password_policy.min_length, 8);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keyring.json");
        let cfg = KeyringConfig {
            default_scheme: Scheme::Direct,
            database: Some(dir.path().join("keys.db")),
            ..KeyringConfig::default()
        };
        cfg.save(&path).unwrap();
        assert_eq!(KeyringConfig::load(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyring.json");
        std::fs::write(
            &path,
            r#"{"default_scheme":"direct","kdf":{"iterations":5},"password_policy":{"min_length":12}}"#,
        )
        .unwrap();
        let cfg = KeyringConfig::load(&path).unwrap();
        assert_eq!(cfg.default_scheme, Scheme::Direct);
        assert_eq!(cfg.kdf.iterations, 5);
        assert_eq!(cfg.kdf.memory_kib, 64 * 1024);
        assert_eq!(cfg.password_policy.min_length, 12);
        assert!(cfg.password_policy.require_symbol);
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keyring.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(KeyringConfig::load(&path).is_err());
    }
}
