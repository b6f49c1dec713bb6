//! Unary RPC handlers. Each one authenticates, calls the service and maps
//! rows to their wire shape.

use std::sync::Arc;

use axum::{Json, extract::State};

use super::{ApiError, AppState, RpcJson};
use crate::auth::RequireUser;
use crate::error::Error;
use crate::store::Queries;
use crate::types::KeyValueKind;
use crate::wire::{
    Ack, AssertDeltaInsert, AssertDeltaUpdate, AssertDeltaWire, AssertInsert, AssertUpdate,
    AssertWire, BodyRawDeltaInsert, BodyRawDeltaUpdate, BodyRawDeltaWire, BodyRawInsert,
    BodyRawUpdate, BodyRawWire, Collection, HttpDeltaInsert, HttpDeltaUpdate, HttpDeltaWire,
    HttpInsert, HttpRef, HttpResponseAssertWire, HttpResponseHeaderWire, HttpResponseWire,
    HttpUpdate, HttpVersionWire, HttpWire, Ids, Items, KeyValueDeltaInsert, KeyValueDeltaUpdate,
    KeyValueDeltaWire, KeyValueInsert, KeyValueUpdate, KeyValueWire,
};

type RpcResult<T> = Result<Json<T>, ApiError>;

fn ack() -> RpcResult<Ack> {
    Ok(Json(Ack {}))
}

fn full<'a, T: 'a, W: From<&'a T>>(rows: &'a [T]) -> Json<Collection<W>> {
    Json(rows.iter().map(W::from).collect::<Vec<_>>().into())
}

fn deltas<T, W>(rows: &[T], to_wire: impl Fn(&T) -> Option<W>) -> Json<Collection<W>> {
    Json(rows.iter().filter_map(to_wire).collect::<Vec<_>>().into())
}

/// Like `deltas`, for child rows whose wire shape names the base entry.
fn loaded_deltas<T, W>(
    state: &AppState,
    rows: &[T],
    to_wire: impl Fn(&Queries<'_>, &T) -> Result<Option<W>, Error>,
) -> RpcResult<Collection<W>> {
    let items = state.service.store().read(|q| {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.extend(to_wire(q, row)?);
        }
        Ok(out)
    })?;
    Ok(Json(items.into()))
}

// Http

pub async fn http_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<HttpWire>> {
    let rows = state.service.http_collection(user.user_id)?;
    Ok(full(&rows))
}

pub async fn http_insert(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<HttpInsert>>,
) -> RpcResult<Ack> {
    state.service.http_insert(user.user_id, body.items)?;
    ack()
}

pub async fn http_update(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<HttpUpdate>>,
) -> RpcResult<Ack> {
    state.service.http_update(user.user_id, body.items)?;
    ack()
}

pub async fn http_delete(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Ids>,
) -> RpcResult<Ack> {
    state.service.http_delete(user.user_id, body.ids)?;
    ack()
}

pub async fn http_delta_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<HttpDeltaWire>> {
    let rows = state.service.http_delta_collection(user.user_id)?;
    Ok(deltas(&rows, HttpDeltaWire::from_delta))
}

pub async fn http_delta_insert(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<HttpDeltaInsert>>,
) -> RpcResult<Ack> {
    state.service.http_delta_insert(user.user_id, body.items)?;
    ack()
}

pub async fn http_delta_update(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<HttpDeltaUpdate>>,
) -> RpcResult<Ack> {
    state.service.http_delta_update(user.user_id, body.items)?;
    ack()
}

pub async fn http_delta_delete(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Ids>,
) -> RpcResult<Ack> {
    state.service.http_delta_delete(user.user_id, body.ids)?;
    ack()
}

pub async fn http_run(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<HttpRef>,
) -> RpcResult<HttpResponseWire> {
    let response = state.service.http_run(user.user_id, body.http_id).await?;
    Ok(Json(HttpResponseWire::from(&response)))
}

// Headers, search params, form and url-encoded bodies

pub async fn key_value_collection(
    state: Arc<AppState>,
    user: RequireUser,
    kind: KeyValueKind,
) -> RpcResult<Collection<KeyValueWire>> {
    let rows = state.service.key_value_collection(kind, user.user_id)?;
    Ok(full(&rows))
}

pub async fn key_value_insert(
    state: Arc<AppState>,
    user: RequireUser,
    kind: KeyValueKind,
    body: Items<KeyValueInsert>,
) -> RpcResult<Ack> {
    state.service.key_value_insert(kind, user.user_id, body.items)?;
    ack()
}

pub async fn key_value_update(
    state: Arc<AppState>,
    user: RequireUser,
    kind: KeyValueKind,
    body: Items<KeyValueUpdate>,
) -> RpcResult<Ack> {
    state.service.key_value_update(kind, user.user_id, body.items)?;
    ack()
}

pub async fn key_value_delete(
    state: Arc<AppState>,
    user: RequireUser,
    kind: KeyValueKind,
    body: Ids,
) -> RpcResult<Ack> {
    state.service.key_value_delete(kind, user.user_id, body.ids)?;
    ack()
}

pub async fn key_value_delta_collection(
    state: Arc<AppState>,
    user: RequireUser,
    kind: KeyValueKind,
) -> RpcResult<Collection<KeyValueDeltaWire>> {
    let rows = state.service.key_value_delta_collection(kind, user.user_id)?;
    loaded_deltas(&state, &rows, KeyValueDeltaWire::load)
}

pub async fn key_value_delta_insert(
    state: Arc<AppState>,
    user: RequireUser,
    kind: KeyValueKind,
    body: Items<KeyValueDeltaInsert>,
) -> RpcResult<Ack> {
    state
        .service
        .key_value_delta_insert(kind, user.user_id, body.items)?;
    ack()
}

pub async fn key_value_delta_update(
    state: Arc<AppState>,
    user: RequireUser,
    kind: KeyValueKind,
    body: Items<KeyValueDeltaUpdate>,
) -> RpcResult<Ack> {
    state
        .service
        .key_value_delta_update(kind, user.user_id, body.items)?;
    ack()
}

pub async fn key_value_delta_delete(
    state: Arc<AppState>,
    user: RequireUser,
    kind: KeyValueKind,
    body: Ids,
) -> RpcResult<Ack> {
    state
        .service
        .key_value_delta_delete(kind, user.user_id, body.ids)?;
    ack()
}

// Asserts

pub async fn assert_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<AssertWire>> {
    let rows = state.service.assert_collection(user.user_id)?;
    Ok(full(&rows))
}

pub async fn assert_insert(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<AssertInsert>>,
) -> RpcResult<Ack> {
    state.service.assert_insert(user.user_id, body.items)?;
    ack()
}

pub async fn assert_update(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<AssertUpdate>>,
) -> RpcResult<Ack> {
    state.service.assert_update(user.user_id, body.items)?;
    ack()
}

pub async fn assert_delete(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Ids>,
) -> RpcResult<Ack> {
    state.service.assert_delete(user.user_id, body.ids)?;
    ack()
}

pub async fn assert_delta_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<AssertDeltaWire>> {
    let rows = state.service.assert_delta_collection(user.user_id)?;
    loaded_deltas(&state, &rows, AssertDeltaWire::load)
}

pub async fn assert_delta_insert(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<AssertDeltaInsert>>,
) -> RpcResult<Ack> {
    state.service.assert_delta_insert(user.user_id, body.items)?;
    ack()
}

pub async fn assert_delta_update(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<AssertDeltaUpdate>>,
) -> RpcResult<Ack> {
    state.service.assert_delta_update(user.user_id, body.items)?;
    ack()
}

pub async fn assert_delta_delete(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Ids>,
) -> RpcResult<Ack> {
    state.service.assert_delta_delete(user.user_id, body.ids)?;
    ack()
}

// Raw bodies, addressed by their owning entry

pub async fn body_raw_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<BodyRawWire>> {
    let rows = state.service.body_raw_collection(user.user_id)?;
    Ok(full(&rows))
}

pub async fn body_raw_insert(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<BodyRawInsert>>,
) -> RpcResult<Ack> {
    state.service.body_raw_insert(user.user_id, body.items)?;
    ack()
}

pub async fn body_raw_update(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<BodyRawUpdate>>,
) -> RpcResult<Ack> {
    state.service.body_raw_update(user.user_id, body.items)?;
    ack()
}

pub async fn body_raw_delete(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Ids>,
) -> RpcResult<Ack> {
    state.service.body_raw_delete(user.user_id, body.ids)?;
    ack()
}

pub async fn body_raw_delta_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<BodyRawDeltaWire>> {
    let rows = state.service.body_raw_delta_collection(user.user_id)?;
    Ok(deltas(&rows, BodyRawDeltaWire::from_delta))
}

pub async fn body_raw_delta_insert(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<BodyRawDeltaInsert>>,
) -> RpcResult<Ack> {
    state.service.body_raw_delta_insert(user.user_id, body.items)?;
    ack()
}

pub async fn body_raw_delta_update(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Items<BodyRawDeltaUpdate>>,
) -> RpcResult<Ack> {
    state.service.body_raw_delta_update(user.user_id, body.items)?;
    ack()
}

pub async fn body_raw_delta_delete(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
    RpcJson(body): RpcJson<Ids>,
) -> RpcResult<Ack> {
    state.service.body_raw_delta_delete(user.user_id, body.ids)?;
    ack()
}

// Run records

pub async fn response_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<HttpResponseWire>> {
    let rows = state.service.response_collection(user.user_id)?;
    Ok(full(&rows))
}

pub async fn response_header_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<HttpResponseHeaderWire>> {
    let rows = state.service.response_header_collection(user.user_id)?;
    Ok(full(&rows))
}

pub async fn response_assert_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<HttpResponseAssertWire>> {
    let rows = state.service.response_assert_collection(user.user_id)?;
    Ok(full(&rows))
}

pub async fn version_collection(
    State(state): State<Arc<AppState>>,
    user: RequireUser,
) -> RpcResult<Collection<HttpVersionWire>> {
    let rows = state.service.version_collection(user.user_id)?;
    Ok(full(&rows))
}
