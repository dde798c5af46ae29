// Test helpers - In-process ThingsBoard stand-in and router spawning
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

/// Scripted ThingsBoard: answers logins with `token-<n>` and the telemetry
/// path with `telemetry`, after `rejections` token rejections.
pub struct MockThingsBoard {
    pub login_status: StatusCode,
    pub telemetry_status: StatusCode,
    pub rejections: usize,
    pub rejection_status: StatusCode,
    pub telemetry: Value,
    pub logins: AtomicUsize,
    pub fetches: AtomicUsize,
    pub last_login: Mutex<Option<Value>>,
    pub last_headers: Mutex<Option<HeaderMap>>,
    pub last_query: Mutex<Option<HashMap<String, String>>>,
    pub last_asset: Mutex<Option<String>>,
}

impl Default for MockThingsBoard {
    fn default() -> Self {
        Self {
            login_status: StatusCode::OK,
            telemetry_status: StatusCode::OK,
            rejections: 0,
            rejection_status: StatusCode::UNAUTHORIZED,
            telemetry: json!({}),
            logins: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            last_login: Mutex::new(None),
            last_headers: Mutex::new(None),
            last_query: Mutex::new(None),
            last_asset: Mutex::new(None),
        }
    }
}

async fn login(State(mock): State<Arc<MockThingsBoard>>, Json(body): Json<Value>) -> Response {
    let n = mock.logins.fetch_add(1, Ordering::SeqCst) + 1;
    *mock.last_login.lock().unwrap() = Some(body);

    if mock.login_status != StatusCode::OK {
        return (mock.login_status, "Authentication failed").into_response();
    }
    Json(json!({ "token": format!("token-{n}"), "refreshToken": "refresh" })).into_response()
}

async fn timeseries(
    State(mock): State<Arc<MockThingsBoard>>,
    Path(asset_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let n = mock.fetches.fetch_add(1, Ordering::SeqCst);
    *mock.last_headers.lock().unwrap() = Some(headers);
    *mock.last_query.lock().unwrap() = Some(params);
    *mock.last_asset.lock().unwrap() = Some(asset_id);

    if n < mock.rejections {
        return (mock.rejection_status, "Token has expired").into_response();
    }
    if mock.telemetry_status != StatusCode::OK {
        return (mock.telemetry_status, "Internal error").into_response();
    }
    Json(mock.telemetry.clone()).into_response()
}

pub async fn spawn_mock_thingsboard(mock: MockThingsBoard) -> (String, Arc<MockThingsBoard>) {
    let mock = Arc::new(mock);
    let router = Router::new()
        .route("/api/auth/login", post(login))
        .route(
            "/api/plugins/telemetry/ASSET/:id/values/timeseries",
            get(timeseries),
        )
        .with_state(mock.clone());

    (spawn_router(router).await, mock)
}

/// Serve `router` on an ephemeral loopback port and return its base URL.
pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}
