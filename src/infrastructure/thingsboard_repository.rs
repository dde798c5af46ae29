// ThingsBoard repository implementation
use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::telemetry_repository::TelemetryRepository;
use crate::domain::error::TelemetryError;
use crate::domain::telemetry::{RawSample, TelemetryQuery, HISTORY_SAMPLE_LIMIT};
use crate::infrastructure::thingsboard_client::{FetchOptions, ThingsBoardClient};

#[derive(Clone)]
pub struct ThingsBoardRepository {
    client: ThingsBoardClient,
}

impl ThingsBoardRepository {
    pub fn new(client: ThingsBoardClient) -> Self {
        Self { client }
    }

    fn timeseries_url(&self, device_id: &str) -> String {
        format!(
            "{}/api/plugins/telemetry/ASSET/{}/values/timeseries",
            self.client.base_url(),
            urlencoding::encode(device_id)
        )
    }

    fn history_url(&self, query: &TelemetryQuery) -> String {
        format!(
            "{}?keys={}&startTs={}&endTs={}&limit={}",
            self.timeseries_url(&query.device_id),
            urlencoding::encode(&query.metric_key),
            query.start_ts,
            query.end_ts,
            HISTORY_SAMPLE_LIMIT
        )
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, TelemetryError> {
        let response = self
            .client
            .fetch_with_auth(url, &FetchOptions::default())
            .await?;

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TelemetryError::Parse(e.to_string()))
    }
}

#[async_trait]
impl TelemetryRepository for ThingsBoardRepository {
    async fn latest_values(&self, device_id: &str) -> Result<serde_json::Value, TelemetryError> {
        let url = self.timeseries_url(device_id);
        tracing::debug!("Fetching ThingsBoard telemetry from: {}", url);

        let data = self.fetch_json(&url).await?;
        tracing::debug!("ThingsBoard telemetry for {}: {}", device_id, data);
        Ok(data)
    }

    async fn history(&self, query: &TelemetryQuery) -> Result<Vec<RawSample>, TelemetryError> {
        let url = self.history_url(query);
        tracing::debug!("Fetching ThingsBoard history from: {}", url);

        let data = self.fetch_json(&url).await?;
        let mut by_key: HashMap<String, Vec<RawSample>> = serde_json::from_value(data)
            .map_err(|e| TelemetryError::Parse(format!("unexpected history payload: {e}")))?;

        let samples = by_key.remove(&query.metric_key).unwrap_or_default();

        // No pagination: a full page means older samples may have been cut off
        if samples.len() >= HISTORY_SAMPLE_LIMIT {
            tracing::warn!(
                "History for {}/{} hit the {} sample limit; data may be truncated",
                query.device_id,
                query.metric_key,
                HISTORY_SAMPLE_LIMIT
            );
        }

        tracing::debug!(
            "Got {} samples for {}/{}",
            samples.len(),
            query.device_id,
            query.metric_key
        );
        Ok(samples)
    }
}
