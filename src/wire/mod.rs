//! JSON shapes of the RPC surface and the event-to-wire converters.
//!
//! Each family has a full-sync shape for base rows and a delta-sync shape
//! for delta rows. Delta update messages carry only the fields the update
//! touched, each as a `{KIND_UNSET, KIND_VALUE}` union.

mod assert;
mod body_raw;
mod http;
mod key_value;
mod response;

pub use assert::{
    AssertDeltaInsert, AssertDeltaRef, AssertDeltaSync, AssertDeltaUpdate, AssertDeltaWire,
    AssertInsert, AssertRef, AssertSync, AssertUpdate, AssertWire, assert_delta_sync,
    assert_sync,
};
pub use body_raw::{
    BodyRawDeltaInsert, BodyRawDeltaSync, BodyRawDeltaUpdate, BodyRawDeltaWire, BodyRawInsert,
    BodyRawRef, BodyRawSync, BodyRawUpdate, BodyRawWire, body_raw_delta_sync, body_raw_sync,
};
pub use http::{
    HttpDeltaInsert, HttpDeltaRef, HttpDeltaSync, HttpDeltaUpdate, HttpDeltaWire, HttpInsert,
    HttpRef, HttpSync, HttpUpdate, HttpWire, http_delta_sync, http_sync,
};
pub use key_value::{
    KeyValueDeltaInsert, KeyValueDeltaRef, KeyValueDeltaSync, KeyValueDeltaUpdate,
    KeyValueDeltaWire, KeyValueInsert, KeyValueRef, KeyValueSync, KeyValueUpdate, KeyValueWire,
    key_value_delta_sync, key_value_sync,
};
pub use response::{
    HttpResponseAssertWire, HttpResponseHeaderWire, HttpResponseWire, HttpVersionWire, RowRef,
    ResponseSync, response_assert_sync, response_header_sync, response_sync, version_sync,
};

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Result;
use crate::store::Queries;
use crate::types::Id;

/// Bytes rendered as standard base64.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Blob(pub Vec<u8>);

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Blob({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Blob {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<Blob> for Vec<u8> {
    fn from(blob: Blob) -> Self {
        blob.0
    }
}

impl Serialize for Blob {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Blob {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD
            .decode(s)
            .map(Self)
            .map_err(|e| serde::de::Error::custom(format!("invalid base64: {e}")))
    }
}

/// Body of every mutation RPC except deletes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Items<T> {
    pub items: Vec<T>,
}

/// Body of every delete RPC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ids {
    pub ids: Vec<Id>,
}

/// Response of every mutation RPC.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {}

/// Response of every collection RPC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection<T> {
    pub items: Vec<T>,
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

/// One message of a sync stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncMessage<I, U, D> {
    Insert(I),
    Update(U),
    Delete(D),
}

fn default_true() -> bool {
    true
}

/// The base entry a delta entry overrides.
fn base_http_id(q: &Queries<'_>, delta_http_id: Id) -> Result<Option<Id>> {
    Ok(q.http().get(delta_http_id)?.and_then(|http| http.parent_http_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_is_base64() {
        let blob = Blob(vec![0x01, 0x02]);
        assert_eq!(serde_json::to_string(&blob).unwrap(), "\"AQI=\"");
        let back: Blob = serde_json::from_str("\"AQI=\"").unwrap();
        assert_eq!(back, blob);
        assert!(serde_json::from_str::<Blob>("\"%%%\"").is_err());
    }

    #[test]
    fn test_ids_reject_wrong_length() {
        let err = serde_json::from_str::<Ids>(r#"{"ids": ["AQI="]}"#).unwrap_err();
        assert!(err.to_string().contains("16 bytes"));
    }
}
