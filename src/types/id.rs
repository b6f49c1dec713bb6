use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{Error, Result};

pub const ID_LEN: usize = 16;

/// Opaque 16-byte identifier.
///
/// Generated from a millisecond clock followed by random bits (UUIDv7 layout),
/// so byte order approximates creation order. Rendered on the wire as standard
/// base64 of the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Id([u8; ID_LEN]);

impl Id {
    #[must_use]
    pub fn new() -> Self {
        Self(*Uuid::now_v7().as_bytes())
    }

    /// Decodes raw bytes. Anything other than exactly 16 bytes is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        <[u8; ID_LEN]>::try_from(bytes)
            .map(Self)
            .map_err(|_| Error::invalid(format!("id must be {ID_LEN} bytes, got {}", bytes.len())))
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    #[must_use]
    pub fn to_vec(self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Millisecond timestamp embedded at generation time.
    #[must_use]
    pub fn timestamp_ms(&self) -> u64 {
        let mut ms = [0u8; 8];
        ms[2..].copy_from_slice(&self.0[..6]);
        u64::from_be_bytes(ms)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&STANDARD.encode(self.0))
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", hex::encode(self.0))
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(s.trim())
            .map_err(|e| Error::invalid(format!("id is not valid base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for Id {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0.as_slice()))
    }
}

impl FromSql for Id {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let blob = value.as_blob()?;
        <[u8; ID_LEN]>::try_from(blob)
            .map(Self)
            .map_err(|_| FromSqlError::InvalidBlobSize {
                expected_size: ID_LEN,
                blob_size: blob.len(),
            })
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_round_trip() {
        let id = Id::new();
        let decoded = Id::from_bytes(&id.to_vec()).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_string_round_trip() {
        let id = Id::new();
        let parsed: Id = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_invalid_lengths_rejected() {
        for len in [0usize, 1, 15, 17, 32] {
            let err = Id::from_bytes(&vec![7u8; len]).unwrap_err();
            assert!(matches!(err, Error::InvalidArgument(_)), "len {len}");
        }
    }

    #[test]
    fn test_invalid_base64_rejected() {
        assert!(matches!(
            "not base64!".parse::<Id>(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            STANDARD.encode([1u8; 8]).parse::<Id>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_generation_order_follows_time() {
        let first = Id::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = Id::new();
        assert!(first < second);
        assert!(first.timestamp_ms() <= second.timestamp_ms());
    }

    #[test]
    fn test_ids_are_unique() {
        let ids: std::collections::HashSet<Id> = (0..1000).map(|_| Id::new()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_json_is_base64_string() {
        let id = Id::from_bytes(&[0u8; 16]).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"AAAAAAAAAAAAAAAAAAAAAA==\"");
        let back: Id = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
