//! Base64url (unpadded) encoding for binary fields in stored records and
//! transport payloads, plus serde adapters for `#[serde(with = ...)]`.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::{CryptoError, CryptoResult};

pub fn encode(bytes: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn decode(s: &str) -> CryptoResult<Vec<u8>> {
    Ok(URL_SAFE_NO_PAD.decode(s)?)
}

/// Decode into a fixed-size array, rejecting any other length.
pub fn decode_array<const N: usize>(s: &str) -> CryptoResult<[u8; N]> {
    let bytes = decode(s)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::Corrupted(format!("expected {N} bytes, got {len}")))
}

/// `#[serde(with = "b64")]` for `Vec<u8>` and `[u8; N]` fields.
pub mod b64 {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&super::encode(bytes))
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = super::decode(&s).map_err(D::Error::custom)?;
        let len = bytes.len();
        T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected length {len}")))
    }
}

/// `#[serde(with = "b64_opt")]` for optional binary fields.
pub mod b64_opt {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        match value {
            Some(bytes) => serializer.serialize_some(&super::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<Vec<u8>>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        raw.map(|s| {
            let bytes = super::decode(&s).map_err(D::Error::custom)?;
            let len = bytes.len();
            T::try_from(bytes).map_err(|_| D::Error::custom(format!("unexpected length {len}")))
        })
        .transpose()
    }
}
