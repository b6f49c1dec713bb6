//! Server-streaming `...Sync` handlers. Each call spawns one stream driver
//! and forwards its messages as SSE `data:` frames.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::Stream;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::AppState;
use crate::auth::RequireUser;
use crate::error::{Error, Result};
use crate::events::Change;
use crate::stream::{MembershipCache, drive};
use crate::types::KeyValueKind;
use crate::wire::{
    assert_delta_sync, assert_sync, body_raw_delta_sync, body_raw_sync, http_delta_sync,
    http_sync, key_value_delta_sync, key_value_sync, response_assert_sync, response_header_sync,
    response_sync, version_sync,
};

type EventStream = Box<dyn Stream<Item = std::result::Result<Event, Infallible>> + Send + Unpin>;

pub type SyncStream = Sse<KeepAliveStream<EventStream>>;

/// Spawns `run` with a fresh cancellation token, membership cache and
/// outbound queue, and returns the SSE response reading that queue.
///
/// The token is cancelled when the response stream is dropped, which is
/// how a client disconnect reaches the driver.
fn open<M, F, Fut>(state: &AppState, family: &'static str, user: &RequireUser, run: F) -> SyncStream
where
    M: Serialize + Send + 'static,
    F: FnOnce(CancellationToken, MembershipCache, mpsc::Sender<M>) -> Fut,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let config = &state.stream;
    let (tx, rx) = mpsc::channel(config.sse_buffer.max(1));
    let cancel = CancellationToken::new();
    let members = MembershipCache::new(state.service.store().clone(), user.user_id);

    let task = run(cancel.clone(), members, tx);
    tokio::spawn(async move {
        match task.await {
            Ok(()) | Err(Error::StreamClosed) => debug!(family, "stream task finished"),
            Err(e) => warn!(family, error = %e, "stream ended with error"),
        }
    });

    let guard = cancel.drop_guard();
    let stream = ReceiverStream::new(rx).filter_map(move |message| {
        let _guard = &guard;
        match serde_json::to_string(&message) {
            Ok(json) => Some(Ok::<_, Infallible>(Event::default().data(json))),
            Err(e) => {
                warn!(family, error = %e, "failed to encode sync message");
                None
            }
        }
    });
    debug!(family, "sse stream attached");

    let stream: EventStream = Box::new(stream);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(config.keep_alive_secs.max(1)))
            .text("keep-alive"),
    )
}

pub async fn http(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    open(&state, "Http", &user, move |cancel, members, tx| async move {
        drive("Http", &streams.http, cancel, members, |c| Ok(http_sync(c)), tx).await
    })
}

pub async fn http_delta(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    let store = state.service.store().clone();
    open(&state, "HttpDelta", &user, move |cancel, members, tx| async move {
        drive(
            "HttpDelta",
            &streams.http_delta,
            cancel,
            members,
            |c| store.read(|q| http_delta_sync(q, c)),
            tx,
        )
        .await
    })
}

pub fn key_value(state: &AppState, user: &RequireUser, kind: KeyValueKind) -> SyncStream {
    let streams = state.service.streams().clone();
    open(state, kind.family(), user, move |cancel, members, tx| async move {
        drive(
            kind.family(),
            streams.key_values(kind),
            cancel,
            members,
            |c: &Change<_>| Ok(key_value_sync(c)),
            tx,
        )
        .await
    })
}

pub fn key_value_delta(state: &AppState, user: &RequireUser, kind: KeyValueKind) -> SyncStream {
    let streams = state.service.streams().clone();
    let store = state.service.store().clone();
    let family = kind.delta_family();
    open(state, family, user, move |cancel, members, tx| async move {
        drive(
            family,
            streams.key_value_deltas(kind),
            cancel,
            members,
            |c: &Change<_, _>| store.read(|q| key_value_delta_sync(q, kind, c)),
            tx,
        )
        .await
    })
}

pub async fn assert(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    open(&state, "HttpAssert", &user, move |cancel, members, tx| async move {
        drive("HttpAssert", &streams.asserts, cancel, members, |c| Ok(assert_sync(c)), tx).await
    })
}

pub async fn assert_delta(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    let store = state.service.store().clone();
    open(&state, "HttpAssertDelta", &user, move |cancel, members, tx| async move {
        drive(
            "HttpAssertDelta",
            &streams.assert_deltas,
            cancel,
            members,
            |c| store.read(|q| assert_delta_sync(q, c)),
            tx,
        )
        .await
    })
}

pub async fn body_raw(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    open(&state, "HttpBodyRaw", &user, move |cancel, members, tx| async move {
        drive("HttpBodyRaw", &streams.body_raw, cancel, members, |c| Ok(body_raw_sync(c)), tx).await
    })
}

pub async fn body_raw_delta(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    let store = state.service.store().clone();
    open(&state, "HttpBodyRawDelta", &user, move |cancel, members, tx| async move {
        drive(
            "HttpBodyRawDelta",
            &streams.body_raw_deltas,
            cancel,
            members,
            |c| store.read(|q| body_raw_delta_sync(q, c)),
            tx,
        )
        .await
    })
}

pub async fn response(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    open(&state, "HttpResponse", &user, move |cancel, members, tx| async move {
        drive("HttpResponse", &streams.responses, cancel, members, |c| Ok(response_sync(c)), tx)
            .await
    })
}

pub async fn response_header(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    open(&state, "HttpResponseHeader", &user, move |cancel, members, tx| async move {
        drive(
            "HttpResponseHeader",
            &streams.response_headers,
            cancel,
            members,
            |c| Ok(response_header_sync(c)),
            tx,
        )
        .await
    })
}

pub async fn response_assert(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    open(&state, "HttpResponseAssert", &user, move |cancel, members, tx| async move {
        drive(
            "HttpResponseAssert",
            &streams.response_asserts,
            cancel,
            members,
            |c| Ok(response_assert_sync(c)),
            tx,
        )
        .await
    })
}

pub async fn version(State(state): State<Arc<AppState>>, user: RequireUser) -> SyncStream {
    let streams = state.service.streams().clone();
    open(&state, "HttpVersion", &user, move |cancel, members, tx| async move {
        drive("HttpVersion", &streams.versions, cancel, members, |c| Ok(version_sync(c)), tx).await
    })
}
