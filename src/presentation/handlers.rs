// HTTP request handlers
use crate::domain::chart::DashboardState;
use crate::domain::telemetry::{RawSample, TelemetryQuery};
use crate::presentation::api_error::ApiError;
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct TitleQuery {
    pub title: Option<String>,
}

#[derive(Serialize)]
pub struct TitleResponse {
    pub title: String,
}

#[derive(Deserialize)]
pub struct AssetQuery {
    pub assetid: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub assetid: Option<String>,
    pub key: Option<String>,
    #[serde(rename = "startTs")]
    pub start_ts: Option<String>,
    #[serde(rename = "endTs")]
    pub end_ts: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Echo the dashboard title given in the query string
pub async fn title(Query(query): Query<TitleQuery>) -> Result<Json<TitleResponse>, ApiError> {
    match non_empty(query.title) {
        Some(title) => Ok(Json(TitleResponse { title })),
        None => {
            tracing::error!("Title parameter is required");
            Err(ApiError::bad_request("title parameter is required"))
        }
    }
}

/// Latest telemetry values of an asset, as returned by the platform
pub async fn get_data(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AssetQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    tracing::info!("GetData request - assetid: {:?}", query.assetid);
    let device_id = require_asset_id(query.assetid)?;

    match state.telemetry_service.current_values(&device_id).await {
        Ok(data) => Ok(Json(data)),
        Err(e) => {
            tracing::error!("ThingsBoard telemetry error: {}", e);
            state.report_failure(&e);
            Err(ApiError::from(&e))
        }
    }
}

/// Samples of one key within `[startTs, endTs]`; `[]` when the key has no data
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<RawSample>>, ApiError> {
    tracing::info!("GetHistory request - assetid: {:?}", query.assetid);
    let device_id = require_asset_id(query.assetid)?;
    let key = non_empty(query.key).ok_or_else(|| ApiError::bad_request("key parameter is required"))?;
    let start_ts = parse_timestamp("startTs", query.start_ts)?;
    let end_ts = parse_timestamp("endTs", query.end_ts)?;

    let telemetry_query =
        TelemetryQuery::new(device_id, key, start_ts, end_ts).map_err(|e| ApiError::from(&e))?;

    match state.telemetry_service.history(&telemetry_query).await {
        Ok(samples) => Ok(Json(samples)),
        Err(e) => {
            tracing::error!("ThingsBoard telemetry history error: {}", e);
            state.report_failure(&e);
            Err(ApiError::from(&e).with_details(&e))
        }
    }
}

/// Latest chart snapshot published by the dashboard worker
pub async fn charts(State(state): State<Arc<AppState>>) -> Json<DashboardState> {
    Json(state.charts.borrow().clone())
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Page not found")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn require_asset_id(assetid: Option<String>) -> Result<String, ApiError> {
    non_empty(assetid).ok_or_else(|| {
        tracing::error!("AssetID parameter is required");
        ApiError::bad_request("assetid parameter is required")
    })
}

fn parse_timestamp(name: &str, value: Option<String>) -> Result<i64, ApiError> {
    let raw = non_empty(value)
        .ok_or_else(|| ApiError::bad_request(format!("{name} parameter is required")))?;
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::bad_request(format!("{name} must be an epoch timestamp in milliseconds")))
}
