use serde::{Deserialize, Serialize};

use super::{Blob, SyncMessage};
use crate::events::Change;
use crate::types::{HttpResponse, HttpResponseAssert, HttpResponseHeader, HttpVersion, Id};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponseWire {
    pub http_response_id: Id,
    pub http_id: Id,
    pub status: i32,
    pub body: Blob,
    pub size: i64,
    pub duration_ms: i64,
    pub created_at: i64,
}

impl From<&HttpResponse> for HttpResponseWire {
    fn from(r: &HttpResponse) -> Self {
        Self {
            http_response_id: r.id,
            http_id: r.http_id,
            status: r.status,
            body: r.body.clone().into(),
            size: r.size,
            duration_ms: r.duration_ms,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponseHeaderWire {
    pub http_response_header_id: Id,
    pub http_response_id: Id,
    pub key: String,
    pub value: String,
}

impl From<&HttpResponseHeader> for HttpResponseHeaderWire {
    fn from(h: &HttpResponseHeader) -> Self {
        Self {
            http_response_header_id: h.id,
            http_response_id: h.response_id,
            key: h.key.clone(),
            value: h.value.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponseAssertWire {
    pub http_response_assert_id: Id,
    pub http_response_id: Id,
    pub value: String,
    pub success: bool,
}

impl From<&HttpResponseAssert> for HttpResponseAssertWire {
    fn from(a: &HttpResponseAssert) -> Self {
        Self {
            http_response_assert_id: a.id,
            http_response_id: a.response_id,
            value: a.value.clone(),
            success: a.success,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpVersionWire {
    pub http_version_id: Id,
    pub http_id: Id,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<Id>,
    pub created_at: i64,
}

impl From<&HttpVersion> for HttpVersionWire {
    fn from(v: &HttpVersion) -> Self {
        Self {
            http_version_id: v.id,
            http_id: v.http_id,
            name: v.name.clone(),
            description: v.description.clone(),
            is_active: v.is_active,
            created_by: v.created_by,
            created_at: v.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRef {
    pub id: Id,
}

/// Run records are never updated; every change is streamed as is.
pub type ResponseSync<W> = SyncMessage<W, W, RowRef>;

fn full_sync<'a, T: 'a, W: From<&'a T>>(change: &'a Change<T>, id: impl Fn(&T) -> Id) -> ResponseSync<W> {
    match change {
        Change::Insert(row) => SyncMessage::Insert(row.into()),
        Change::Update { entity, .. } => SyncMessage::Update(entity.into()),
        Change::Delete(row) => SyncMessage::Delete(RowRef { id: id(row) }),
    }
}

pub fn response_sync(change: &Change<HttpResponse>) -> Option<ResponseSync<HttpResponseWire>> {
    Some(full_sync(change, |r| r.id))
}

pub fn response_header_sync(
    change: &Change<HttpResponseHeader>,
) -> Option<ResponseSync<HttpResponseHeaderWire>> {
    Some(full_sync(change, |h| h.id))
}

pub fn response_assert_sync(
    change: &Change<HttpResponseAssert>,
) -> Option<ResponseSync<HttpResponseAssertWire>> {
    Some(full_sync(change, |a| a.id))
}

pub fn version_sync(change: &Change<HttpVersion>) -> Option<ResponseSync<HttpVersionWire>> {
    Some(full_sync(change, |v| v.id))
}
