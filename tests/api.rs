//! RPC surface tests. Each test drives the router in-process against its
//! own temporary database.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::TestApp;
use httpdelta::server::RPC_PREFIX;
use httpdelta::types::Id;

async fn insert_http(app: &TestApp, url: &str) -> Id {
    let id = Id::new();
    let (status, _) = app
        .owner(
            "HttpInsert",
            json!({"items": [{
                "http_id": id,
                "workspace_id": app.workspace_id,
                "name": "list users",
                "url": url,
                "method": "GET",
            }]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    id
}

async fn insert_delta(app: &TestApp, parent: Id, url: &str) -> Id {
    let id = Id::new();
    let (status, body) = app
        .owner(
            "HttpDeltaInsert",
            json!({"items": [{"delta_http_id": id, "http_id": parent, "url": url}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    id
}

fn items(body: &Value) -> &Vec<Value> {
    body["items"].as_array().expect("items array")
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new();
    let response = app
        .router
        .clone()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"OK");
}

#[tokio::test]
async fn test_requires_bearer_token() {
    let app = TestApp::new();

    let (status, body) = app.rpc("HttpCollection", None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "unauthenticated");

    let (status, _) = app
        .rpc("HttpCollection", Some("httpdelta_deadbeef_nope"), json!({}))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_insert_then_collection() {
    let app = TestApp::new();
    let id = insert_http(&app, "https://api.example.com/users").await;

    let (status, body) = app.viewer("HttpCollection", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let rows = items(&body);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["http_id"], json!(id));
    assert_eq!(rows[0]["method"], "GET");
    assert_eq!(rows[0]["body_kind"], "NONE");
}

#[tokio::test]
async fn test_viewer_cannot_write() {
    let app = TestApp::new();
    let (status, body) = app
        .viewer(
            "HttpInsert",
            json!({"items": [{"workspace_id": app.workspace_id, "name": "x"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "permission_denied");

    let (_, body) = app.owner("HttpCollection", json!({})).await;
    assert!(items(&body).is_empty());
}

#[tokio::test]
async fn test_malformed_requests_are_invalid_argument() {
    let app = TestApp::new();

    let (status, body) = app.owner("HttpInsert", json!({"items": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_argument");

    let (status, body) = app
        .owner("HttpDelete", json!({"ids": ["AAEC"]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_argument");

    let (status, _) = app.owner("HttpUpdate", json!({"items": "nope"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_entry_is_not_found() {
    let app = TestApp::new();
    let (status, body) = app
        .owner("HttpUpdate", json!({"items": [{"http_id": Id::new(), "name": "x"}]}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_delta_override_and_clear() {
    let app = TestApp::new();
    let base = insert_http(&app, "https://api.example.com/users").await;
    let delta = insert_delta(&app, base, "https://staging.example.com/users").await;

    let (_, body) = app.owner("HttpDeltaCollection", json!({})).await;
    let rows = items(&body);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["delta_http_id"], json!(delta));
    assert_eq!(rows[0]["http_id"], json!(base));
    assert_eq!(rows[0]["url"], "https://staging.example.com/users");
    assert!(rows[0].get("name").is_none());

    let (status, _) = app
        .owner(
            "HttpDeltaUpdate",
            json!({"items": [{
                "delta_http_id": delta,
                "url": {"kind": "KIND_UNSET"},
                "name": {"kind": "KIND_VALUE", "value": "staging"},
            }]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.owner("HttpDeltaCollection", json!({})).await;
    let row = &items(&body)[0];
    assert_eq!(row["url"], "");
    assert_eq!(row["name"], "staging");

    // Deltas never appear on the base collection.
    let (_, body) = app.owner("HttpCollection", json!({})).await;
    assert_eq!(items(&body).len(), 1);
}

#[tokio::test]
async fn test_delete_referenced_base_sets_foreign_key() {
    let app = TestApp::new();
    let base = insert_http(&app, "https://api.example.com").await;
    insert_delta(&app, base, "https://staging.example.com").await;

    let (status, body) = app.owner("HttpDelete", json!({"ids": [base]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_argument");
    assert_eq!(body["foreign_key"], true);
}

#[tokio::test]
async fn test_delta_call_on_base_entry() {
    let app = TestApp::new();
    let base = insert_http(&app, "https://api.example.com").await;

    let (status, body) = app
        .owner(
            "HttpDeltaUpdate",
            json!({"items": [{"delta_http_id": base, "url": {"kind": "KIND_VALUE", "value": "x"}}]}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_argument");
    assert_eq!(body["foreign_key"], false);
}

#[tokio::test]
async fn test_header_family_routes() {
    let app = TestApp::new();
    let base = insert_http(&app, "https://api.example.com").await;

    let (status, _) = app
        .owner(
            "HttpHeaderInsert",
            json!({"items": [{"http_id": base, "key": "Accept", "value": "application/json"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.viewer("HttpHeaderCollection", json!({})).await;
    let rows = items(&body);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["key"], "Accept");
    assert_eq!(rows[0]["enabled"], true);

    // Search params are a separate family.
    let (_, body) = app.viewer("HttpSearchParamCollection", json!({})).await;
    assert!(items(&body).is_empty());
}

#[tokio::test]
async fn test_delta_children_reference_base_entry() {
    let app = TestApp::new();
    let base = insert_http(&app, "https://api.example.com").await;
    let delta = insert_delta(&app, base, "https://staging.example.com").await;

    let header = Id::new();
    let (status, _) = app
        .owner(
            "HttpHeaderInsert",
            json!({"items": [{"id": header, "http_id": base, "key": "X-Env", "value": "prod"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app
        .owner(
            "HttpHeaderDeltaInsert",
            json!({"items": [{"id": header, "http_id": delta, "value": "zzz"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (_, body) = app.viewer("HttpHeaderDeltaCollection", json!({})).await;
    let rows = items(&body);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["http_id"], json!(base));
    assert_eq!(rows[0]["delta_http_id"], json!(delta));
    assert_eq!(rows[0]["id"], json!(header));
    assert_eq!(rows[0]["value"], "zzz");

    let (status, body) = app
        .owner(
            "HttpAssertDeltaInsert",
            json!({"items": [{"http_id": delta, "value": "status == 200"}]}),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (_, body) = app.viewer("HttpAssertDeltaCollection", json!({})).await;
    let rows = items(&body);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["http_id"], json!(base));
    assert_eq!(rows[0]["delta_http_id"], json!(delta));
    assert!(rows[0].get("http_assert_id").is_none());
}

#[tokio::test]
async fn test_run_without_executor_is_internal() {
    let app = TestApp::new();
    let base = insert_http(&app, "https://api.example.com").await;

    let (status, body) = app.owner("HttpRun", json!({"http_id": base})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "internal");
}

#[tokio::test]
async fn test_sync_streams_inserts() {
    let app = TestApp::new();
    let request = Request::post(format!("{RPC_PREFIX}/HttpSync"))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.viewer_token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );

    let streams = app.state.service.streams().clone();
    while streams.http.subscriber_count() == 0 {
        tokio::task::yield_now().await;
    }

    let id = insert_http(&app, "https://api.example.com").await;

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(1), body.frame())
        .await
        .expect("frame in time")
        .expect("stream open")
        .expect("frame");
    let data = frame.into_data().expect("data frame");
    let text = std::str::from_utf8(&data).unwrap();
    let json_text = text
        .trim()
        .strip_prefix("data: ")
        .expect("sse data line");
    let message: Value = serde_json::from_str(json_text).unwrap();
    assert_eq!(message["kind"], "insert");
    assert_eq!(message["http_id"], json!(id));

    drop(body);
    tokio::time::timeout(Duration::from_secs(1), async {
        while streams.http.subscriber_count() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("subscription released after disconnect");
}
