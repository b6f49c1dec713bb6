use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::{RpcJson, rpc, sync};
use crate::auth::{RequireUser, TokenGenerator};
use crate::config::StreamConfig;
use crate::error::Result;
use crate::service::Service;
use crate::types::KeyValueKind;
use crate::wire::{
    Ids, Items, KeyValueDeltaInsert, KeyValueDeltaUpdate, KeyValueInsert, KeyValueUpdate,
};

/// Path prefix of every RPC; the method name follows, e.g.
/// `/rpc/HttpService/HttpInsert`.
pub const RPC_PREFIX: &str = "/rpc/HttpService";

pub struct AppState {
    pub service: Arc<Service>,
    pub tokens: TokenGenerator,
    pub stream: StreamConfig,
}

impl AppState {
    pub fn new(service: Arc<Service>, stream: StreamConfig) -> Result<Self> {
        Ok(Self {
            service,
            tokens: TokenGenerator::new()?,
            stream,
        })
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn path(method: &str) -> String {
    format!("{RPC_PREFIX}/{method}")
}

/// The ten calls of one key/value family, named after `kind.family()`.
fn key_value_routes(router: Router<Arc<AppState>>, kind: KeyValueKind) -> Router<Arc<AppState>> {
    let family = kind.family();
    router
        .route(
            &path(&format!("{family}Collection")),
            post(move |State(state): State<Arc<AppState>>, user: RequireUser| {
                rpc::key_value_collection(state, user, kind)
            }),
        )
        .route(
            &path(&format!("{family}Insert")),
            post(
                move |State(state): State<Arc<AppState>>,
                      user: RequireUser,
                      RpcJson(body): RpcJson<Items<KeyValueInsert>>| {
                    rpc::key_value_insert(state, user, kind, body)
                },
            ),
        )
        .route(
            &path(&format!("{family}Update")),
            post(
                move |State(state): State<Arc<AppState>>,
                      user: RequireUser,
                      RpcJson(body): RpcJson<Items<KeyValueUpdate>>| {
                    rpc::key_value_update(state, user, kind, body)
                },
            ),
        )
        .route(
            &path(&format!("{family}Delete")),
            post(
                move |State(state): State<Arc<AppState>>,
                      user: RequireUser,
                      RpcJson(body): RpcJson<Ids>| {
                    rpc::key_value_delete(state, user, kind, body)
                },
            ),
        )
        .route(
            &path(&format!("{family}Sync")),
            post(move |State(state): State<Arc<AppState>>, user: RequireUser| async move {
                sync::key_value(&state, &user, kind)
            }),
        )
        .route(
            &path(&format!("{family}DeltaCollection")),
            post(move |State(state): State<Arc<AppState>>, user: RequireUser| {
                rpc::key_value_delta_collection(state, user, kind)
            }),
        )
        .route(
            &path(&format!("{family}DeltaInsert")),
            post(
                move |State(state): State<Arc<AppState>>,
                      user: RequireUser,
                      RpcJson(body): RpcJson<Items<KeyValueDeltaInsert>>| {
                    rpc::key_value_delta_insert(state, user, kind, body)
                },
            ),
        )
        .route(
            &path(&format!("{family}DeltaUpdate")),
            post(
                move |State(state): State<Arc<AppState>>,
                      user: RequireUser,
                      RpcJson(body): RpcJson<Items<KeyValueDeltaUpdate>>| {
                    rpc::key_value_delta_update(state, user, kind, body)
                },
            ),
        )
        .route(
            &path(&format!("{family}DeltaDelete")),
            post(
                move |State(state): State<Arc<AppState>>,
                      user: RequireUser,
                      RpcJson(body): RpcJson<Ids>| {
                    rpc::key_value_delta_delete(state, user, kind, body)
                },
            ),
        )
        .route(
            &path(&format!("{family}DeltaSync")),
            post(move |State(state): State<Arc<AppState>>, user: RequireUser| async move {
                sync::key_value_delta(&state, &user, kind)
            }),
        )
}

fn rpc_router() -> Router<Arc<AppState>> {
    let router = Router::new()
        .route(&path("HttpCollection"), post(rpc::http_collection))
        .route(&path("HttpInsert"), post(rpc::http_insert))
        .route(&path("HttpUpdate"), post(rpc::http_update))
        .route(&path("HttpDelete"), post(rpc::http_delete))
        .route(&path("HttpSync"), post(sync::http))
        .route(&path("HttpDeltaCollection"), post(rpc::http_delta_collection))
        .route(&path("HttpDeltaInsert"), post(rpc::http_delta_insert))
        .route(&path("HttpDeltaUpdate"), post(rpc::http_delta_update))
        .route(&path("HttpDeltaDelete"), post(rpc::http_delta_delete))
        .route(&path("HttpDeltaSync"), post(sync::http_delta))
        .route(&path("HttpRun"), post(rpc::http_run))
        .route(&path("HttpAssertCollection"), post(rpc::assert_collection))
        .route(&path("HttpAssertInsert"), post(rpc::assert_insert))
        .route(&path("HttpAssertUpdate"), post(rpc::assert_update))
        .route(&path("HttpAssertDelete"), post(rpc::assert_delete))
        .route(&path("HttpAssertSync"), post(sync::assert))
        .route(&path("HttpAssertDeltaCollection"), post(rpc::assert_delta_collection))
        .route(&path("HttpAssertDeltaInsert"), post(rpc::assert_delta_insert))
        .route(&path("HttpAssertDeltaUpdate"), post(rpc::assert_delta_update))
        .route(&path("HttpAssertDeltaDelete"), post(rpc::assert_delta_delete))
        .route(&path("HttpAssertDeltaSync"), post(sync::assert_delta))
        .route(&path("HttpBodyRawCollection"), post(rpc::body_raw_collection))
        .route(&path("HttpBodyRawInsert"), post(rpc::body_raw_insert))
        .route(&path("HttpBodyRawUpdate"), post(rpc::body_raw_update))
        .route(&path("HttpBodyRawDelete"), post(rpc::body_raw_delete))
        .route(&path("HttpBodyRawSync"), post(sync::body_raw))
        .route(&path("HttpBodyRawDeltaCollection"), post(rpc::body_raw_delta_collection))
        .route(&path("HttpBodyRawDeltaInsert"), post(rpc::body_raw_delta_insert))
        .route(&path("HttpBodyRawDeltaUpdate"), post(rpc::body_raw_delta_update))
        .route(&path("HttpBodyRawDeltaDelete"), post(rpc::body_raw_delta_delete))
        .route(&path("HttpBodyRawDeltaSync"), post(sync::body_raw_delta))
        .route(&path("HttpResponseCollection"), post(rpc::response_collection))
        .route(&path("HttpResponseSync"), post(sync::response))
        .route(&path("HttpResponseHeaderCollection"), post(rpc::response_header_collection))
        .route(&path("HttpResponseHeaderSync"), post(sync::response_header))
        .route(&path("HttpResponseAssertCollection"), post(rpc::response_assert_collection))
        .route(&path("HttpResponseAssertSync"), post(sync::response_assert))
        .route(&path("HttpVersionCollection"), post(rpc::version_collection))
        .route(&path("HttpVersionSync"), post(sync::version));

    KeyValueKind::ALL.into_iter().fold(router, key_value_routes)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(rpc_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}
