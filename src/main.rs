// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

#[cfg(test)]
mod test_support;

use std::{env, net::SocketAddr, sync::Arc};

use tokio::sync::{mpsc, watch};
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_worker::DashboardWorker;
use crate::application::refresh_service::{RefreshPolicy, RefreshService, TokioSleeper};
use crate::application::telemetry_service::TelemetryService;
use crate::domain::chart::DashboardState;
use crate::infrastructure::config::load_dashboard_config;
use crate::infrastructure::thingsboard_client::ThingsBoardClient;
use crate::infrastructure::thingsboard_repository::ThingsBoardRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::router::build_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    // Load configuration
    let config = load_dashboard_config()?;
    config.log_config();

    // Create repository (infrastructure layer)
    let client = ThingsBoardClient::from_settings(&config.thingsboard)?;
    let repository = Arc::new(ThingsBoardRepository::new(client));

    // Create services (application layer)
    let telemetry_service = TelemetryService::new(repository);

    let (failure_tx, failure_rx) = mpsc::channel(32);
    let (charts_tx, charts_rx) = watch::channel(DashboardState::default());

    match config.dashboard.asset_id.clone() {
        Some(asset_id) => {
            let refresh = RefreshService::new(
                Arc::new(telemetry_service.clone()),
                asset_id,
                RefreshPolicy {
                    max_retries: config.dashboard.refresh_retries,
                    delay: config.dashboard.refresh_retry_delay(),
                },
                Arc::new(TokioSleeper),
                config.dashboard.timezone()?,
                config.dashboard.locale()?,
            );
            let worker = DashboardWorker::new(
                refresh,
                config.dashboard.refresh_interval(),
                failure_rx,
                charts_tx,
            );
            tokio::spawn(worker.run());
        }
        None => {
            tracing::warn!("DASHBOARD_ASSET_ID not set; chart refresh is disabled");
        }
    }

    // Create application state
    let state = Arc::new(AppState {
        telemetry_service,
        failures: failure_tx,
        charts: charts_rx,
    });

    // Build router (presentation layer)
    let router = build_router(state, &config.server.static_dir);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Server running at http://localhost:{}", config.server.port);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router).await?;

    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `DASHBOARD_LOG_LEVEL` picks the level
/// (default `info`).
fn init_tracing() {
    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("DASHBOARD_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "info",
        };
        EnvFilter::new(format!("{level},tower_http=info,hyper=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_env_filter(env_filter)
        .compact()
        .init();
}
