// Refresh service - Fetch four histories, bucket them by month, update the charts
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Locale, Utc};
use chrono_tz::Tz;

use crate::application::telemetry_service::TelemetryService;
use crate::domain::chart::{
    DashboardSeries, DashboardState, CO2_AVOIDED_KEY, CO2_EMITTED_KEY, ENERGY_GRID_KEY,
    ENERGY_SOLAR_KEY,
};
use crate::domain::error::{RefreshError, TelemetryError};
use crate::domain::monthly::{bucket_by_month, MonthlyBucketSeries, TimeWindow, TRAILING_MONTHS};
use crate::domain::telemetry::{RawSample, TelemetryQuery};

/// Where a refresh cycle reads history from.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_history(&self, query: TelemetryQuery) -> Result<Vec<RawSample>, TelemetryError>;
}

#[async_trait]
impl HistorySource for TelemetryService {
    async fn fetch_history(&self, query: TelemetryQuery) -> Result<Vec<RawSample>, TelemetryError> {
        self.history(&query).await
    }
}

/// Delay primitive used between refresh attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fixed-delay retry schedule for a refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Data loaded; `charts_updated` is false when no chart existed yet
    Refreshed { attempts: u32, charts_updated: bool },
    GaveUp { attempts: u32 },
}

#[derive(Clone)]
pub struct RefreshService {
    source: Arc<dyn HistorySource>,
    device_id: String,
    policy: RefreshPolicy,
    sleeper: Arc<dyn Sleeper>,
    timezone: Tz,
    locale: Locale,
}

impl RefreshService {
    pub fn new(
        source: Arc<dyn HistorySource>,
        device_id: impl Into<String>,
        policy: RefreshPolicy,
        sleeper: Arc<dyn Sleeper>,
        timezone: Tz,
        locale: Locale,
    ) -> Self {
        Self {
            source,
            device_id: device_id.into(),
            policy,
            sleeper,
            timezone,
            locale,
        }
    }

    /// One-time chart creation, single attempt.
    ///
    /// Each missing chart loads its own pair of keys, so one failing metric
    /// only holds back the chart it belongs to. Existing charts are kept.
    pub async fn bootstrap(&self, state: &mut DashboardState) -> Result<(), RefreshError> {
        let (now, window) = self.window();
        let mut first_error = None;

        if state.co2.is_none() {
            match self.load_pair(CO2_AVOIDED_KEY, CO2_EMITTED_KEY, &now, window).await {
                Ok((avoided, emitted)) => {
                    state.create_co2_chart(&avoided, &emitted);
                    tracing::info!("CO₂ chart created for {}", self.device_id);
                }
                Err(e) => {
                    tracing::error!("Error creating CO₂ chart: {}", e);
                    first_error = first_error.or(Some(e));
                }
            }
        }

        if state.energy.is_none() {
            match self.load_pair(ENERGY_SOLAR_KEY, ENERGY_GRID_KEY, &now, window).await {
                Ok((solar, grid)) => {
                    state.create_energy_chart(&solar, &grid);
                    tracing::info!("Energy chart created for {}", self.device_id);
                }
                Err(e) => {
                    tracing::error!("Error creating energy chart: {}", e);
                    first_error = first_error.or(Some(e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reload all histories and update existing charts in place.
    ///
    /// Failed cycles are retried after the policy delay until the retry budget
    /// is spent; the failure is then logged and dropped, leaving the charts as
    /// they were.
    pub async fn refresh_history(&self, state: &mut DashboardState) -> RefreshOutcome {
        let mut attempt = 1;

        loop {
            tracing::info!("Refreshing historical data...");

            match self.load().await {
                Ok(series) => {
                    let charts_updated = state.update_charts(&series);
                    if !charts_updated {
                        tracing::debug!("No charts to update yet");
                    }
                    return RefreshOutcome::Refreshed {
                        attempts: attempt,
                        charts_updated,
                    };
                }
                Err(e) => {
                    tracing::error!("Error refreshing historical data: {}", e);

                    if attempt > self.policy.max_retries {
                        tracing::error!(
                            "Max retry limit reached. Could not refresh historical data."
                        );
                        return RefreshOutcome::GaveUp { attempts: attempt };
                    }

                    tracing::info!(
                        "Retrying refresh in {:?} ({}/{})",
                        self.policy.delay,
                        attempt,
                        self.policy.max_retries
                    );
                    self.sleeper.sleep(self.policy.delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Fetch the four metrics concurrently; any failure fails the whole cycle.
    async fn load(&self) -> Result<DashboardSeries, RefreshError> {
        let (now, window) = self.window();

        let ((co2_avoided, co2_emitted), (energy_solar, energy_grid)) = futures::try_join!(
            self.load_pair(CO2_AVOIDED_KEY, CO2_EMITTED_KEY, &now, window),
            self.load_pair(ENERGY_SOLAR_KEY, ENERGY_GRID_KEY, &now, window),
        )?;

        Ok(DashboardSeries {
            co2_avoided,
            co2_emitted,
            energy_solar,
            energy_grid,
        })
    }

    fn window(&self) -> (DateTime<Tz>, TimeWindow) {
        let now = Utc::now().with_timezone(&self.timezone);
        let window = TimeWindow::trailing_months(&now, TRAILING_MONTHS as u32);
        (now, window)
    }

    /// Both datasets of one chart, fetched concurrently and bucketed by month.
    async fn load_pair(
        &self,
        first: &str,
        second: &str,
        now: &DateTime<Tz>,
        window: TimeWindow,
    ) -> Result<(MonthlyBucketSeries, MonthlyBucketSeries), RefreshError> {
        let (a, b) = futures::try_join!(self.fetch(first, window), self.fetch(second, window))?;

        Ok((
            bucket_by_month(&a, first, now, self.locale),
            bucket_by_month(&b, second, now, self.locale),
        ))
    }

    async fn fetch(&self, key: &str, window: TimeWindow) -> Result<Vec<RawSample>, RefreshError> {
        let wrap = |source: TelemetryError| RefreshError::Fetch {
            key: key.to_string(),
            source,
        };

        let query = TelemetryQuery::new(self.device_id.as_str(), key, window.start_ts, window.end_ts)
            .map_err(wrap)?;
        self.source.fetch_history(query).await.map_err(wrap)
    }
}
