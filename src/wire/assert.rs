use serde::{Deserialize, Serialize};

use super::{SyncMessage, base_http_id, default_true};
use crate::error::Result;
use crate::events::Change;
use crate::patch::AssertDeltaPatch;
use crate::store::Queries;
use crate::types::{HttpAssert, Id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertWire {
    pub http_assert_id: Id,
    pub http_id: Id,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,
}

impl From<&HttpAssert> for AssertWire {
    fn from(assert: &HttpAssert) -> Self {
        Self {
            http_assert_id: assert.id,
            http_id: assert.http_id,
            value: assert.value.clone(),
            enabled: assert.enabled,
            description: assert.description.clone(),
            display_order: assert.display_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertDeltaWire {
    pub delta_http_assert_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_assert_id: Option<Id>,
    pub http_id: Id,
    pub delta_http_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<f64>,
}

impl AssertDeltaWire {
    pub fn from_delta(assert: &HttpAssert, base_http_id: Id) -> Option<Self> {
        assert.is_delta.then(|| Self {
            delta_http_assert_id: assert.id,
            http_assert_id: assert.parent_id,
            http_id: base_http_id,
            delta_http_id: assert.http_id,
            value: assert.delta_value.clone(),
            enabled: assert.delta_enabled,
            description: assert.delta_description.clone(),
            display_order: assert.delta_display_order,
        })
    }

    pub fn load(q: &Queries<'_>, assert: &HttpAssert) -> Result<Option<Self>> {
        if !assert.is_delta {
            return Ok(None);
        }
        let base = base_http_id(q, assert.http_id)?;
        Ok(base.and_then(|base| Self::from_delta(assert, base)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertInsert {
    #[serde(default)]
    pub http_assert_id: Option<Id>,
    pub http_id: Id,
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
pub struct AssertUpdate {
    pub http_assert_id: Id,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub display_order: Option<f64>,
}

impl AssertUpdate {
    pub fn apply(&self, assert: &mut HttpAssert) {
        if let Some(value) = &self.value {
            assert.value.clone_from(value);
        }
        if let Some(enabled) = self.enabled {
            assert.enabled = enabled;
        }
        if let Some(description) = &self.description {
            assert.description.clone_from(description);
        }
        if let Some(display_order) = self.display_order {
            assert.display_order = display_order;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertDeltaInsert {
    #[serde(default)]
    pub delta_http_assert_id: Option<Id>,
    #[serde(default)]
    pub http_assert_id: Option<Id>,
    pub http_id: Id,
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
pub struct AssertDeltaUpdate {
    pub delta_http_assert_id: Id,
    #[serde(flatten)]
    pub patch: AssertDeltaPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertRef {
    pub http_assert_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertDeltaRef {
    pub delta_http_assert_id: Id,
}

pub type AssertSync = SyncMessage<AssertWire, AssertWire, AssertRef>;
pub type AssertDeltaSync = SyncMessage<AssertDeltaWire, AssertDeltaUpdate, AssertDeltaRef>;

pub fn assert_sync(change: &Change<HttpAssert>) -> Option<AssertSync> {
    if change.entity().is_delta {
        return None;
    }
    Some(match change {
        Change::Insert(assert) => SyncMessage::Insert(assert.into()),
        Change::Update { entity, .. } => SyncMessage::Update(entity.into()),
        Change::Delete(assert) => SyncMessage::Delete(AssertRef {
            http_assert_id: assert.id,
        }),
    })
}

pub fn assert_delta_sync(
    q: &Queries<'_>,
    change: &Change<HttpAssert, AssertDeltaPatch>,
) -> Result<Option<AssertDeltaSync>> {
    match change {
        Change::Insert(assert) => {
            let wire = match q.asserts().get(assert.id)? {
                Some(current) => AssertDeltaWire::load(q, &current)?,
                None => None,
            };
            Ok(wire.map(SyncMessage::Insert))
        }
        Change::Update { entity, patch } => {
            let still_delta = q.asserts().get(entity.id)?.is_some_and(|a| a.is_delta);
            Ok(still_delta.then(|| {
                SyncMessage::Update(AssertDeltaUpdate {
                    delta_http_assert_id: entity.id,
                    patch: patch.clone(),
                })
            }))
        }
        Change::Delete(assert) => Ok(assert.is_delta.then(|| {
            SyncMessage::Delete(AssertDeltaRef {
                delta_http_assert_id: assert.id,
            })
        })),
    }
}
