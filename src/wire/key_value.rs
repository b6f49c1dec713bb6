use serde::{Deserialize, Serialize};

use super::{SyncMessage, base_http_id, default_true};
use crate::error::Result;
use crate::events::Change;
use crate::patch::KeyValueDeltaPatch;
use crate::store::Queries;
use crate::types::{HttpKeyValue, Id, KeyValueKind};

/// Shared by headers, search params, form fields and url-encoded fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueWire {
    pub id: Id,
    pub http_id: Id,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,
}

impl From<&HttpKeyValue> for KeyValueWire {
    fn from(kv: &HttpKeyValue) -> Self {
        Self {
            id: kv.id,
            http_id: kv.http_id,
            key: kv.key.clone(),
            value: kv.value.clone(),
            enabled: kv.enabled,
            description: kv.description.clone(),
            display_order: kv.display_order,
        }
    }
}

/// A delta row: `delta_id` is the row itself, `id` the base row it
/// overrides (absent for delta-only rows), `http_id` the base entry and
/// `delta_http_id` the delta entry owning the row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueDeltaWire {
    pub delta_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    pub http_id: Id,
    pub delta_http_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<f64>,
}

impl KeyValueDeltaWire {
    pub fn from_delta(kv: &HttpKeyValue, base_http_id: Id) -> Option<Self> {
        kv.is_delta.then(|| Self {
            delta_id: kv.id,
            id: kv.parent_id,
            http_id: base_http_id,
            delta_http_id: kv.http_id,
            key: kv.delta_key.clone(),
            value: kv.delta_value.clone(),
            enabled: kv.delta_enabled,
            description: kv.delta_description.clone(),
            display_order: kv.delta_display_order,
        })
    }

    /// Looks up the base entry behind the row's delta entry.
    pub fn load(q: &Queries<'_>, kv: &HttpKeyValue) -> Result<Option<Self>> {
        if !kv.is_delta {
            return Ok(None);
        }
        let base = base_http_id(q, kv.http_id)?;
        Ok(base.and_then(|base| Self::from_delta(kv, base)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueInsert {
    #[serde(default)]
    pub id: Option<Id>,
    pub http_id: Id,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub display_order: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueUpdate {
    pub id: Id,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_order: Option<f64>,
}

impl KeyValueUpdate {
    pub fn apply(&self, kv: &mut HttpKeyValue) {
        if let Some(key) = &self.key {
            kv.key.clone_from(key);
        }
        if let Some(value) = &self.value {
            kv.value.clone_from(value);
        }
        if let Some(enabled) = self.enabled {
            kv.enabled = enabled;
        }
        if let Some(description) = &self.description {
            kv.description.clone_from(description);
        }
        if let Some(display_order) = self.display_order {
            kv.display_order = display_order;
        }
    }
}

/// Creates a delta row on the delta entry `http_id`, overriding the base
/// row `id` or, without `id`, adding a row of its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueDeltaInsert {
    #[serde(default)]
    pub delta_id: Option<Id>,
    #[serde(default)]
    pub id: Option<Id>,
    pub http_id: Id,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_order: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueDeltaUpdate {
    pub delta_id: Id,
    #[serde(flatten)]
    pub patch: KeyValueDeltaPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueRef {
    pub id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyValueDeltaRef {
    pub delta_id: Id,
}

pub type KeyValueSync = SyncMessage<KeyValueWire, KeyValueWire, KeyValueRef>;
pub type KeyValueDeltaSync = SyncMessage<KeyValueDeltaWire, KeyValueDeltaUpdate, KeyValueDeltaRef>;

pub fn key_value_sync(change: &Change<HttpKeyValue>) -> Option<KeyValueSync> {
    if change.entity().is_delta {
        return None;
    }
    Some(match change {
        Change::Insert(kv) => SyncMessage::Insert(kv.into()),
        Change::Update { entity, .. } => SyncMessage::Update(entity.into()),
        Change::Delete(kv) => SyncMessage::Delete(KeyValueRef { id: kv.id }),
    })
}

pub fn key_value_delta_sync(
    q: &Queries<'_>,
    kind: KeyValueKind,
    change: &Change<HttpKeyValue, KeyValueDeltaPatch>,
) -> Result<Option<KeyValueDeltaSync>> {
    match change {
        Change::Insert(kv) => {
            let wire = match q.key_values(kind).get(kv.id)? {
                Some(current) => KeyValueDeltaWire::load(q, &current)?,
                None => None,
            };
            Ok(wire.map(SyncMessage::Insert))
        }
        Change::Update { entity, patch } => {
            let still_delta = q
                .key_values(kind)
                .get(entity.id)?
                .is_some_and(|kv| kv.is_delta);
            Ok(still_delta.then(|| {
                SyncMessage::Update(KeyValueDeltaUpdate {
                    delta_id: entity.id,
                    patch: patch.clone(),
                })
            }))
        }
        Change::Delete(kv) => Ok(kv
            .is_delta
            .then(|| SyncMessage::Delete(KeyValueDeltaRef { delta_id: kv.id }))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::patch::Patch;

    #[test]
    fn test_delta_insert_defaults() {
        let item: KeyValueDeltaInsert = serde_json::from_value(json!({
            "http_id": Id::new().to_string(),
            "value": "zzz",
        }))
        .unwrap();
        assert_eq!(item.value.as_deref(), Some("zzz"));
        assert!(item.id.is_none());
        assert!(item.key.is_none());
    }

    #[test]
    fn test_insert_enabled_by_default() {
        let item: KeyValueInsert = serde_json::from_value(json!({
            "http_id": Id::new().to_string(),
            "key": "Accept",
        }))
        .unwrap();
        assert!(item.enabled);
        assert_eq!(item.value, "");
    }

    #[test]
    fn test_update_request_keeps_three_states() {
        let item: KeyValueDeltaUpdate = serde_json::from_value(json!({
            "delta_id": Id::new().to_string(),
            "value": {"kind": "KIND_UNSET"},
            "key": {"kind": "KIND_VALUE", "value": "X-Other"},
        }))
        .unwrap();
        assert_eq!(item.patch.fields(), vec!["key", "value"]);
    }
}
