// Telemetry service - Validated reads of current values and history
use std::sync::Arc;

use crate::application::telemetry_repository::TelemetryRepository;
use crate::domain::error::TelemetryError;
use crate::domain::telemetry::{RawSample, TelemetryQuery};

#[derive(Clone)]
pub struct TelemetryService {
    repository: Arc<dyn TelemetryRepository>,
}

impl TelemetryService {
    pub fn new(repository: Arc<dyn TelemetryRepository>) -> Self {
        Self { repository }
    }

    pub async fn current_values(&self, device_id: &str) -> Result<serde_json::Value, TelemetryError> {
        if device_id.trim().is_empty() {
            return Err(TelemetryError::validation("device id must not be empty"));
        }
        self.repository.latest_values(device_id).await
    }

    /// History of one key, restricted to the query range.
    pub async fn history(&self, query: &TelemetryQuery) -> Result<Vec<RawSample>, TelemetryError> {
        let samples = self.repository.history(query).await?;
        let total = samples.len();

        let in_range: Vec<RawSample> = samples
            .into_iter()
            .filter(|s| query.contains(s.ts))
            .collect();

        if in_range.len() < total {
            tracing::warn!(
                "Dropped {} samples outside [{}, {}] for {}",
                total - in_range.len(),
                query.start_ts,
                query.end_ts,
                query.metric_key
            );
        }

        Ok(in_range)
    }
}
