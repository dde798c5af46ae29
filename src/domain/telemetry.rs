// Telemetry query and sample domain models
use serde::{Deserialize, Serialize};

use super::error::TelemetryError;

/// Upper bound on samples the platform returns for one history request.
pub const HISTORY_SAMPLE_LIMIT: usize = 5000;

/// A validated time-series query against one asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryQuery {
    pub device_id: String,
    pub metric_key: String,
    pub start_ts: i64,
    pub end_ts: i64,
}

impl TelemetryQuery {
    pub fn new(
        device_id: impl Into<String>,
        metric_key: impl Into<String>,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<Self, TelemetryError> {
        let device_id = device_id.into();
        let metric_key = metric_key.into();

        if device_id.trim().is_empty() {
            return Err(TelemetryError::validation("device id must not be empty"));
        }
        if metric_key.trim().is_empty() {
            return Err(TelemetryError::validation("metric key must not be empty"));
        }
        if start_ts > end_ts {
            return Err(TelemetryError::validation(format!(
                "startTs ({start_ts}) must not be after endTs ({end_ts})"
            )));
        }

        Ok(Self {
            device_id,
            metric_key,
            start_ts,
            end_ts,
        })
    }

    pub fn contains(&self, ts: i64) -> bool {
        (self.start_ts..=self.end_ts).contains(&ts)
    }
}

/// One time-stamped reading as the platform returns it.
///
/// The value is kept in its upstream encoding (normally a string) so the
/// history endpoint can hand samples back untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub ts: i64,
    pub value: serde_json::Value,
}

impl RawSample {
    #[cfg(test)]
    pub fn new(ts: i64, value: impl Into<serde_json::Value>) -> Self {
        Self {
            ts,
            value: value.into(),
        }
    }

    /// Numeric reading, whether encoded as a JSON string or number
    pub fn numeric_value(&self) -> Option<f64> {
        let value = match &self.value {
            serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
            serde_json::Value::Number(n) => n.as_f64(),
            _ => None,
        };
        value.filter(|v| v.is_finite())
    }
}
