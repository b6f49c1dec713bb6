use serde::{Deserialize, Serialize};

use super::SyncMessage;
use crate::error::Result;
use crate::events::Change;
use crate::patch::HttpDeltaPatch;
use crate::store::Queries;
use crate::types::{BodyKind, Http, HttpMethod, Id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpWire {
    pub http_id: Id,
    pub workspace_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<Id>,
    pub name: String,
    pub url: String,
    pub method: HttpMethod,
    pub description: String,
    pub body_kind: BodyKind,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<&Http> for HttpWire {
    fn from(http: &Http) -> Self {
        Self {
            http_id: http.id,
            workspace_id: http.workspace_id,
            folder_id: http.folder_id,
            name: http.name.clone(),
            url: http.url.clone(),
            method: http.method,
            description: http.description.clone(),
            body_kind: http.body_kind,
            created_at: http.created_at,
            updated_at: http.updated_at,
        }
    }
}

/// A delta entry as stored: `http_id` is its parent, the optional fields
/// are the overrides (absent = inherit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpDeltaWire {
    pub delta_http_id: Id,
    pub http_id: Id,
    pub workspace_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl HttpDeltaWire {
    /// `None` for rows that are not deltas.
    pub fn from_delta(http: &Http) -> Option<Self> {
        Some(Self {
            delta_http_id: http.id,
            http_id: http.parent_http_id.filter(|_| http.is_delta)?,
            workspace_id: http.workspace_id,
            name: http.delta_name.clone(),
            url: http.delta_url.clone(),
            method: http.delta_method,
            created_at: http.created_at,
            updated_at: http.updated_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpInsert {
    #[serde(default)]
    pub http_id: Option<Id>,
    pub workspace_id: Id,
    #[serde(default)]
    pub folder_id: Option<Id>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body_kind: BodyKind,
}

/// Base update; absent fields are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpUpdate {
    pub http_id: Id,
    #[serde(default)]
    pub folder_id: Option<Id>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: Option<HttpMethod>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub body_kind: Option<BodyKind>,
}

impl HttpUpdate {
    pub fn apply(&self, http: &mut Http) {
        if let Some(folder_id) = self.folder_id {
            http.folder_id = Some(folder_id);
        }
        if let Some(name) = &self.name {
            http.name.clone_from(name);
        }
        if let Some(url) = &self.url {
            http.url.clone_from(url);
        }
        if let Some(method) = self.method {
            http.method = method;
        }
        if let Some(description) = &self.description {
            http.description.clone_from(description);
        }
        if let Some(body_kind) = self.body_kind {
            http.body_kind = body_kind;
        }
    }
}

/// Creates a delta of the base entry `http_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpDeltaInsert {
    #[serde(default)]
    pub delta_http_id: Option<Id>,
    pub http_id: Id,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: Option<HttpMethod>,
}

/// Sparse update of a delta entry; also the update message of the delta
/// stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpDeltaUpdate {
    pub delta_http_id: Id,
    #[serde(flatten)]
    pub patch: HttpDeltaPatch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRef {
    pub http_id: Id,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpDeltaRef {
    pub delta_http_id: Id,
}

pub type HttpSync = SyncMessage<HttpWire, HttpWire, HttpRef>;
pub type HttpDeltaSync = SyncMessage<HttpDeltaWire, HttpDeltaUpdate, HttpDeltaRef>;

pub fn http_sync(change: &Change<Http>) -> Option<HttpSync> {
    let http = change.entity();
    if http.is_delta {
        return None;
    }
    Some(match change {
        Change::Insert(http) => SyncMessage::Insert(http.into()),
        Change::Update { entity, .. } => SyncMessage::Update(entity.into()),
        Change::Delete(http) => SyncMessage::Delete(HttpRef { http_id: http.id }),
    })
}

/// Inserts are re-read so the message carries the current state; rows that
/// are gone or no longer deltas are skipped. Deletes come from the event.
pub fn http_delta_sync(
    q: &Queries<'_>,
    change: &Change<Http, HttpDeltaPatch>,
) -> Result<Option<HttpDeltaSync>> {
    match change {
        Change::Insert(http) => {
            let current = q.http().get(http.id)?;
            Ok(current
                .as_ref()
                .and_then(HttpDeltaWire::from_delta)
                .map(SyncMessage::Insert))
        }
        Change::Update { entity, patch } => {
            let still_delta = q.http().get(entity.id)?.is_some_and(|h| h.is_delta);
            Ok(still_delta.then(|| {
                SyncMessage::Update(HttpDeltaUpdate {
                    delta_http_id: entity.id,
                    patch: patch.clone(),
                })
            }))
        }
        Change::Delete(http) => Ok(http.is_delta.then(|| {
            SyncMessage::Delete(HttpDeltaRef {
                delta_http_id: http.id,
            })
        })),
    }
}
