use async_trait::async_trait;
use tracing::{info, warn};

use super::Service;
use crate::error::{Error, ExecutorErrorKind, Result};
use crate::events::{Change, Pending};
use crate::resolve::{ResolvedRequest, resolve_request};
use crate::types::{
    HttpResponse, HttpResponseAssert, HttpResponseHeader, HttpVersion, Id, Permission, now_ms,
};

/// Outcome of one evaluated assert expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssertOutcome {
    pub value: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub status: i32,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub duration_ms: i64,
    pub asserts: Vec<AssertOutcome>,
}

/// Issues a resolved request. Failures are reported as
/// [`Error::Executor`] with their kind preserved.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: &ResolvedRequest) -> Result<ExecutionOutcome>;
}

/// Rows written by one run.
struct RunRecord {
    workspace_id: Id,
    response: HttpResponse,
    headers: Vec<HttpResponseHeader>,
    asserts: Vec<HttpResponseAssert>,
    version: HttpVersion,
}

impl RunRecord {
    fn new(workspace_id: Id, user_id: Id, request: &ResolvedRequest, outcome: ExecutionOutcome) -> Self {
        let now = now_ms();
        let response_id = Id::new();
        let headers = outcome
            .headers
            .into_iter()
            .map(|(key, value)| HttpResponseHeader {
                id: Id::new(),
                response_id,
                key,
                value,
            })
            .collect();
        let asserts = outcome
            .asserts
            .into_iter()
            .map(|a| HttpResponseAssert {
                id: Id::new(),
                response_id,
                value: a.value,
                success: a.success,
            })
            .collect();

        Self {
            workspace_id,
            response: HttpResponse {
                id: response_id,
                http_id: request.http.id,
                status: outcome.status,
                size: i64::try_from(outcome.body.len()).unwrap_or(i64::MAX),
                body: outcome.body,
                duration_ms: outcome.duration_ms,
                created_at: now,
            },
            headers,
            asserts,
            version: HttpVersion {
                id: Id::new(),
                http_id: request.http.id,
                name: request.http.name.clone(),
                description: format!("{} {}", request.http.method.as_str(), request.url()),
                is_active: true,
                created_by: Some(user_id),
                created_at: now,
            },
        }
    }
}

impl Service {
    /// Resolves and executes the entry `http_id`, recording the response
    /// and a version row.
    pub async fn http_run(&self, user_id: Id, http_id: Id) -> Result<HttpResponse> {
        let http = self.get_http(http_id)?;
        self.access(user_id)
            .require(http.workspace_id, Permission::WRITE)?;

        let executor = self.executor.clone().ok_or_else(|| Error::Executor {
            kind: ExecutorErrorKind::Other,
            message: "no executor configured".into(),
        })?;

        let request = self.store.read(|q| resolve_request(q, http_id))?;
        let outcome = executor.execute(&request).await.inspect_err(|e| {
            warn!(http_id = %http_id, error = %e, "execution failed");
        })?;
        let record = RunRecord::new(http.workspace_id, user_id, &request, outcome);

        let (responses, headers, asserts, versions) = self.store.transact(|q| {
            let mut responses = Pending::default();
            let mut headers = Pending::default();
            let mut asserts = Pending::default();
            let mut versions = Pending::default();

            q.responses().create_response(&record.response)?;
            responses.push(record.workspace_id, Change::Insert(record.response.clone()));
            for header in &record.headers {
                q.responses().create_header(header)?;
                headers.push(record.workspace_id, Change::Insert(header.clone()));
            }
            for assert in &record.asserts {
                q.responses().create_assert(assert)?;
                asserts.push(record.workspace_id, Change::Insert(assert.clone()));
            }
            for previous in q.responses().create_version(&record.version)? {
                versions.push(
                    record.workspace_id,
                    Change::Update {
                        entity: previous,
                        patch: (),
                    },
                );
            }
            versions.push(record.workspace_id, Change::Insert(record.version.clone()));

            Ok((responses, headers, asserts, versions))
        })?;

        responses.publish("HttpResponse", &self.streams.responses);
        headers.publish("HttpResponseHeader", &self.streams.response_headers);
        asserts.publish("HttpResponseAssert", &self.streams.response_asserts);
        versions.publish("HttpVersion", &self.streams.versions);

        info!(
            http_id = %http_id,
            status = record.response.status,
            duration_ms = record.response.duration_ms,
            "run recorded"
        );
        Ok(record.response)
    }
}
