//! Sparse field updates for delta rows.
//!
//! Every overlay field of a patch is an `Option<PatchValue<T>>`:
//!
//! | patch field             | meaning                                  |
//! |-------------------------|------------------------------------------|
//! | `None`                  | untouched, keep the stored override      |
//! | `Some(PatchValue::Unset)` | clear to the zero value of the field   |
//! | `Some(PatchValue::Value(v))` | set or replace the override with `v` |
//!
//! On the wire `PatchValue` is the `{KIND_UNSET, KIND_VALUE}` union and an
//! untouched field is simply omitted, so the three states survive from the
//! request to storage and back out on update events.

use serde::{Deserialize, Serialize};

use crate::types::{HttpAssert, HttpBodyRaw, HttpKeyValue, HttpMethod};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum PatchValue<T> {
    #[serde(rename = "KIND_UNSET")]
    Unset,
    #[serde(rename = "KIND_VALUE")]
    Value(T),
}

impl<T> PatchValue<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PatchValue<U> {
        match self {
            Self::Unset => PatchValue::Unset,
            Self::Value(v) => PatchValue::Value(f(v)),
        }
    }

    pub fn as_ref(&self) -> PatchValue<&T> {
        match self {
            Self::Unset => PatchValue::Unset,
            Self::Value(v) => PatchValue::Value(v),
        }
    }
}

impl<T: Default> PatchValue<T> {
    /// The stored override this value produces. A cleared field is stored
    /// as its zero value, which is distinct from `None` (inherit).
    pub fn into_override(self) -> T {
        match self {
            Self::Unset => T::default(),
            Self::Value(v) => v,
        }
    }
}

fn apply_field<T: Default + Clone>(slot: &mut Option<T>, field: &Option<PatchValue<T>>) {
    if let Some(change) = field {
        *slot = Some(change.clone().into_override());
    }
}

/// Sparse update of a delta row. Patches compose with right bias: applying
/// `a` then `b` is the same as applying `a.merge(b)`.
pub trait Patch: Default + Clone {
    type Target;

    fn merge(self, later: Self) -> Self;

    fn is_empty(&self) -> bool;

    /// Names of the fields this patch touches, in declaration order.
    fn fields(&self) -> Vec<&'static str>;

    /// Writes the touched overlay fields onto a delta row.
    fn apply(&self, target: &mut Self::Target);
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpDeltaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<PatchValue<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<PatchValue<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<PatchValue<HttpMethod>>,
}

impl Patch for HttpDeltaPatch {
    type Target = crate::types::Http;

    fn merge(self, later: Self) -> Self {
        Self {
            name: later.name.or(self.name),
            url: later.url.or(self.url),
            method: later.method.or(self.method),
        }
    }

    fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.method.is_none()
    }

    fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.url.is_some() {
            fields.push("url");
        }
        if self.method.is_some() {
            fields.push("method");
        }
        fields
    }

    fn apply(&self, target: &mut Self::Target) {
        apply_field(&mut target.delta_name, &self.name);
        apply_field(&mut target.delta_url, &self.url);
        apply_field(&mut target.delta_method, &self.method);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyValueDeltaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PatchValue<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PatchValue<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<PatchValue<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<PatchValue<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<PatchValue<f64>>,
}

impl Patch for KeyValueDeltaPatch {
    type Target = HttpKeyValue;

    fn merge(self, later: Self) -> Self {
        Self {
            key: later.key.or(self.key),
            value: later.value.or(self.value),
            enabled: later.enabled.or(self.enabled),
            description: later.description.or(self.description),
            display_order: later.display_order.or(self.display_order),
        }
    }

    fn is_empty(&self) -> bool {
        self.key.is_none()
            && self.value.is_none()
            && self.enabled.is_none()
            && self.description.is_none()
            && self.display_order.is_none()
    }

    fn fields(&self) -> Vec<&'static str> {
        [
            ("key", self.key.is_some()),
            ("value", self.value.is_some()),
            ("enabled", self.enabled.is_some()),
            ("description", self.description.is_some()),
            ("display_order", self.display_order.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    fn apply(&self, target: &mut HttpKeyValue) {
        apply_field(&mut target.delta_key, &self.key);
        apply_field(&mut target.delta_value, &self.value);
        apply_field(&mut target.delta_enabled, &self.enabled);
        apply_field(&mut target.delta_description, &self.description);
        apply_field(&mut target.delta_display_order, &self.display_order);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssertDeltaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<PatchValue<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<PatchValue<bool>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<PatchValue<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<PatchValue<f64>>,
}

impl Patch for AssertDeltaPatch {
    type Target = HttpAssert;

    fn merge(self, later: Self) -> Self {
        Self {
            value: later.value.or(self.value),
            enabled: later.enabled.or(self.enabled),
            description: later.description.or(self.description),
            display_order: later.display_order.or(self.display_order),
        }
    }

    fn is_empty(&self) -> bool {
        self.value.is_none()
            && self.enabled.is_none()
            && self.description.is_none()
            && self.display_order.is_none()
    }

    fn fields(&self) -> Vec<&'static str> {
        [
            ("value", self.value.is_some()),
            ("enabled", self.enabled.is_some()),
            ("description", self.description.is_some()),
            ("display_order", self.display_order.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    fn apply(&self, target: &mut HttpAssert) {
        apply_field(&mut target.delta_value, &self.value);
        apply_field(&mut target.delta_enabled, &self.enabled);
        apply_field(&mut target.delta_description, &self.description);
        apply_field(&mut target.delta_display_order, &self.display_order);
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyRawDeltaPatch {
    pub data: Option<PatchValue<Vec<u8>>>,
}

impl Patch for BodyRawDeltaPatch {
    type Target = HttpBodyRaw;

    fn merge(self, later: Self) -> Self {
        Self {
            data: later.data.or(self.data),
        }
    }

    fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    fn fields(&self) -> Vec<&'static str> {
        if self.data.is_some() { vec!["data"] } else { Vec::new() }
    }

    fn apply(&self, target: &mut HttpBodyRaw) {
        apply_field(&mut target.delta_raw_data, &self.data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Id;

    fn delta_header() -> HttpKeyValue {
        HttpKeyValue {
            id: Id::new(),
            http_id: Id::new(),
            key: "X-API-Key".into(),
            value: "abc".into(),
            enabled: true,
            description: String::new(),
            display_order: 1.0,
            is_delta: true,
            parent_id: Some(Id::new()),
            delta_key: None,
            delta_value: Some("zzz".into()),
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_wire_shape() {
        let patch = KeyValueDeltaPatch {
            value: Some(PatchValue::Unset),
            enabled: Some(PatchValue::Value(false)),
            ..Default::default()
        };
        let json = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "value": {"kind": "KIND_UNSET"},
                "enabled": {"kind": "KIND_VALUE", "value": false},
            })
        );

        let back: KeyValueDeltaPatch = serde_json::from_value(json).unwrap();
        assert_eq!(back, patch);
    }

    #[test]
    fn test_absent_field_is_untouched() {
        let mut row = delta_header();
        KeyValueDeltaPatch {
            key: Some(PatchValue::Value("X-Other".into())),
            ..Default::default()
        }
        .apply(&mut row);

        assert_eq!(row.delta_key.as_deref(), Some("X-Other"));
        assert_eq!(row.delta_value.as_deref(), Some("zzz"));
        assert_eq!(row.delta_enabled, None);
    }

    #[test]
    fn test_unset_stores_zero_value_not_inherit() {
        let mut row = delta_header();
        KeyValueDeltaPatch {
            value: Some(PatchValue::Unset),
            enabled: Some(PatchValue::Unset),
            ..Default::default()
        }
        .apply(&mut row);

        assert_eq!(row.delta_value, Some(String::new()));
        assert_eq!(row.delta_enabled, Some(false));
    }

    #[test]
    fn test_merge_is_right_biased() {
        let a = KeyValueDeltaPatch {
            key: Some(PatchValue::Value("a".into())),
            value: Some(PatchValue::Value("1".into())),
            ..Default::default()
        };
        let b = KeyValueDeltaPatch {
            value: Some(PatchValue::Unset),
            enabled: Some(PatchValue::Value(true)),
            ..Default::default()
        };

        let merged = a.clone().merge(b.clone());
        assert_eq!(merged.key, Some(PatchValue::Value("a".into())));
        assert_eq!(merged.value, Some(PatchValue::Unset));
        assert_eq!(merged.enabled, Some(PatchValue::Value(true)));

        let row = delta_header();
        let mut sequential = row.clone();
        a.apply(&mut sequential);
        b.apply(&mut sequential);

        let mut composed = row;
        merged.apply(&mut composed);

        assert_eq!(sequential, composed);
    }

    #[test]
    fn test_fields_lists_only_touched() {
        let patch = AssertDeltaPatch {
            description: Some(PatchValue::Unset),
            ..Default::default()
        };
        assert_eq!(patch.fields(), vec!["description"]);
        assert!(!patch.is_empty());
        assert!(AssertDeltaPatch::default().is_empty());
    }

    #[test]
    fn test_body_unset_is_empty_bytes() {
        let mut body = HttpBodyRaw {
            id: Id::new(),
            http_id: Id::new(),
            raw_data: vec![1, 2],
            compression_type: Default::default(),
            is_delta: true,
            parent_body_raw_id: None,
            delta_raw_data: Some(b"Z".to_vec()),
            created_at: 0,
            updated_at: 0,
        };
        BodyRawDeltaPatch {
            data: Some(PatchValue::Unset),
        }
        .apply(&mut body);

        assert_eq!(body.delta_raw_data, Some(Vec::new()));
        assert_eq!(body.raw_data, vec![1, 2]);
    }

    #[test]
    fn test_http_patch_method_cleared() {
        let patch: HttpDeltaPatch =
            serde_json::from_str(r#"{"method": {"kind": "KIND_UNSET"}}"#).unwrap();
        assert_eq!(patch.fields(), vec!["method"]);
        assert_eq!(patch.method.unwrap().into_override(), HttpMethod::Unspecified);
    }
}
