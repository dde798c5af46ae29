// Route table, static files and HTTP middleware
use std::path::Path;
use std::sync::Arc;

use axum::{handler::HandlerWithoutStateExt, routing::get, Router};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    charts, get_data, get_history, health_check, not_found, title,
};

/// API routes first; anything else is looked up in `static_dir`, and what is
/// not found there gets a plain-text 404.
pub fn build_router(state: Arc<AppState>, static_dir: impl AsRef<Path>) -> Router {
    let static_files = ServeDir::new(static_dir).not_found_service(not_found.into_service());

    Router::new()
        .route("/healthz", get(health_check))
        .route("/api/title", get(title))
        .route("/api/getdata", get(get_data))
        .route("/api/gethistory", get(get_history))
        .route("/api/charts", get(charts))
        .fallback_service(static_files)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
