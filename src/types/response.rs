use serde::{Deserialize, Serialize};

use super::Id;

/// A recorded response of one run. Response rows are immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub id: Id,
    pub http_id: Id,
    pub status: i32,
    pub body: Vec<u8>,
    pub size: i64,
    pub duration_ms: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponseHeader {
    pub id: Id,
    pub response_id: Id,
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponseAssert {
    pub id: Id,
    pub response_id: Id,
    pub value: String,
    pub success: bool,
}

/// Marks one run of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpVersion {
    pub id: Id,
    pub http_id: Id,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub created_by: Option<Id>,
    pub created_at: i64,
}
