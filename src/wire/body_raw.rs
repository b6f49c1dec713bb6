use serde::{Deserialize, Serialize};

use super::{Blob, SyncMessage};
use crate::error::Result;
use crate::events::Change;
use crate::patch::{BodyRawDeltaPatch, PatchValue};
use crate::store::Queries;
use crate::types::{CompressionType, HttpBodyRaw, Id};

/// Raw bodies are singletons per entry, so every shape is keyed by the
/// owning entry's id. On the delta stream that is the delta entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRawWire {
    pub http_id: Id,
    pub data: Blob,
    pub compression_type: CompressionType,
}

impl From<&HttpBodyRaw> for BodyRawWire {
    fn from(body: &HttpBodyRaw) -> Self {
        Self {
            http_id: body.http_id,
            data: body.raw_data.clone().into(),
            compression_type: body.compression_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRawDeltaWire {
    pub http_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Blob>,
    pub compression_type: CompressionType,
}

impl BodyRawDeltaWire {
    pub fn from_delta(body: &HttpBodyRaw) -> Option<Self> {
        body.is_delta.then(|| Self {
            http_id: body.http_id,
            data: body.delta_raw_data.clone().map(Blob::from),
            compression_type: body.compression_type,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRawInsert {
    pub http_id: Id,
    #[serde(default)]
    pub data: Blob,
    #[serde(default)]
    pub compression_type: CompressionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRawUpdate {
    pub http_id: Id,
    #[serde(default)]
    pub data: Option<Blob>,
    #[serde(default)]
    pub compression_type: Option<CompressionType>,
}

impl BodyRawUpdate {
    pub fn apply(&self, body: &mut HttpBodyRaw) {
        if let Some(data) = &self.data {
            body.raw_data.clone_from(&data.0);
        }
        if let Some(compression_type) = self.compression_type {
            body.compression_type = compression_type;
        }
    }
}

/// Creates the delta body of the delta entry `http_id`. Without `data` the
/// body inherits the parent's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRawDeltaInsert {
    pub http_id: Id,
    #[serde(default)]
    pub data: Option<Blob>,
    #[serde(default)]
    pub compression_type: CompressionType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRawDeltaUpdate {
    pub http_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PatchValue<Blob>>,
}

impl BodyRawDeltaUpdate {
    #[must_use]
    pub fn patch(&self) -> BodyRawDeltaPatch {
        BodyRawDeltaPatch {
            data: self.data.clone().map(|v| v.map(Vec::from)),
        }
    }

    fn from_patch(http_id: Id, patch: &BodyRawDeltaPatch) -> Self {
        Self {
            http_id,
            data: patch.data.clone().map(|v| v.map(Blob::from)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyRawRef {
    pub http_id: Id,
}

pub type BodyRawSync = SyncMessage<BodyRawWire, BodyRawWire, BodyRawRef>;
pub type BodyRawDeltaSync = SyncMessage<BodyRawDeltaWire, BodyRawDeltaUpdate, BodyRawRef>;

pub fn body_raw_sync(change: &Change<HttpBodyRaw>) -> Option<BodyRawSync> {
    if change.entity().is_delta {
        return None;
    }
    Some(match change {
        Change::Insert(body) => SyncMessage::Insert(body.into()),
        Change::Update { entity, .. } => SyncMessage::Update(entity.into()),
        Change::Delete(body) => SyncMessage::Delete(BodyRawRef {
            http_id: body.http_id,
        }),
    })
}

pub fn body_raw_delta_sync(
    q: &Queries<'_>,
    change: &Change<HttpBodyRaw, BodyRawDeltaPatch>,
) -> Result<Option<BodyRawDeltaSync>> {
    match change {
        Change::Insert(body) => {
            let current = q.body_raw().get(body.id)?;
            Ok(current
                .as_ref()
                .and_then(BodyRawDeltaWire::from_delta)
                .map(SyncMessage::Insert))
        }
        Change::Update { entity, patch } => {
            let still_delta = q.body_raw().get(entity.id)?.is_some_and(|b| b.is_delta);
            Ok(still_delta
                .then(|| SyncMessage::Update(BodyRawDeltaUpdate::from_patch(entity.http_id, patch))))
        }
        Change::Delete(body) => Ok(body.is_delta.then(|| {
            SyncMessage::Delete(BodyRawRef {
                http_id: body.http_id,
            })
        })),
    }
}
