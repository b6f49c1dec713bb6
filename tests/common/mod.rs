#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use httpdelta::config::StreamConfig;
use httpdelta::events::Streams;
use httpdelta::server::{AppState, RPC_PREFIX, create_router};
use httpdelta::service::Service;
use httpdelta::store::SqliteStore;
use httpdelta::types::{Id, Role, User, Workspace, now_ms};

/// A seeded server: one workspace with an owner and a read-only member,
/// each holding a bearer token.
pub struct TestApp {
    pub temp_dir: TempDir,
    pub state: Arc<AppState>,
    pub router: Router,
    pub workspace_id: Id,
    pub owner_id: Id,
    pub owner_token: String,
    pub viewer_token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let store = SqliteStore::new(temp_dir.path().join("httpdelta.db")).expect("open store");
        store.initialize().expect("initialize store");

        let config = StreamConfig::default();
        let streams = Arc::new(Streams::new(&config));
        let service = Arc::new(Service::new(Arc::new(store), streams));
        let state = Arc::new(AppState::new(service, config).expect("app state"));

        let workspace = Workspace {
            id: Id::new(),
            name: "main".into(),
            created_at: now_ms(),
            updated_at: now_ms(),
        };
        let (owner_id, owner_token) = seed_user(&state, &workspace, "alice", Role::Owner, true);
        let (_, viewer_token) = seed_user(&state, &workspace, "bob", Role::User, false);

        let router = create_router(state.clone());
        Self {
            temp_dir,
            state,
            router,
            workspace_id: workspace.id,
            owner_id,
            owner_token,
            viewer_token,
        }
    }

    /// Posts `body` to `method` and returns the status and decoded JSON.
    pub async fn rpc(&self, method: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let mut request = Request::post(format!("{RPC_PREFIX}/{method}"))
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = request
            .body(Body::from(body.to_string()))
            .expect("build request");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    pub async fn owner(&self, method: &str, body: Value) -> (StatusCode, Value) {
        self.rpc(method, Some(&self.owner_token), body).await
    }

    pub async fn viewer(&self, method: &str, body: Value) -> (StatusCode, Value) {
        self.rpc(method, Some(&self.viewer_token), body).await
    }
}

fn seed_user(
    state: &AppState,
    workspace: &Workspace,
    name: &str,
    role: Role,
    create_workspace: bool,
) -> (Id, String) {
    let user = User {
        id: Id::new(),
        name: name.into(),
        created_at: now_ms(),
    };
    let (token, raw) = state.tokens.issue(user.id).expect("issue token");
    state
        .service
        .store()
        .transact(|q| {
            q.workspaces().create_user(&user)?;
            q.workspaces().create_token(&token)?;
            if create_workspace {
                q.workspaces().create_workspace(workspace)?;
            }
            q.workspaces().add_member(workspace.id, user.id, role)
        })
        .expect("seed user");
    (user.id, raw)
}
