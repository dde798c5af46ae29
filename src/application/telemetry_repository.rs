// Repository trait for telemetry data access
use crate::domain::error::TelemetryError;
use crate::domain::telemetry::{RawSample, TelemetryQuery};
use async_trait::async_trait;

#[async_trait]
pub trait TelemetryRepository: Send + Sync {
    /// Latest value per key for an asset, exactly as the platform returns it
    async fn latest_values(&self, device_id: &str) -> Result<serde_json::Value, TelemetryError>;

    /// Samples of one key within the query range; empty when the key is absent
    async fn history(&self, query: &TelemetryQuery) -> Result<Vec<RawSample>, TelemetryError>;
}
