// Application state for HTTP handlers
use tokio::sync::{mpsc, watch};

use crate::application::telemetry_service::TelemetryService;
use crate::domain::chart::DashboardState;
use crate::domain::error::{FailureKind, TelemetryError};

#[derive(Clone)]
pub struct AppState {
    pub telemetry_service: TelemetryService,
    pub failures: mpsc::Sender<FailureKind>,
    pub charts: watch::Receiver<DashboardState>,
}

impl AppState {
    /// Let the dashboard worker know a request failed. Never blocks the handler.
    pub fn report_failure(&self, err: &TelemetryError) {
        if let Err(e) = self.failures.try_send(err.kind()) {
            tracing::debug!("Failure not forwarded to dashboard worker: {}", e);
        }
    }
}
