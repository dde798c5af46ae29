// Dashboard worker - Owns the chart state and decides when to refresh it
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::application::refresh_service::{RefreshOutcome, RefreshService};
use crate::domain::chart::DashboardState;
use crate::domain::error::FailureKind;

/// Runs the refresh loop on its own task.
///
/// Refreshes happen on start, on every interval tick and whenever a handler
/// reports a retry-worthy failure. Each finished cycle publishes a snapshot
/// of the charts on the watch channel.
pub struct DashboardWorker {
    refresh: RefreshService,
    interval: Duration,
    failures: mpsc::Receiver<FailureKind>,
    charts: watch::Sender<DashboardState>,
}

impl DashboardWorker {
    pub fn new(
        refresh: RefreshService,
        interval: Duration,
        failures: mpsc::Receiver<FailureKind>,
        charts: watch::Sender<DashboardState>,
    ) -> Self {
        Self {
            refresh,
            interval,
            failures,
            charts,
        }
    }

    pub async fn run(mut self) {
        let mut state = DashboardState::default();
        self.cycle(&mut state).await;

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut listening = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.cycle(&mut state).await;
                }

                observed = self.failures.recv(), if listening => match observed {
                    Some(kind) if kind.is_retry_worthy() => {
                        tracing::warn!("{:?} failure observed, retrying refresh...", kind);
                        self.cycle(&mut state).await;
                        // One refresh answers every failure queued meanwhile
                        while self.failures.try_recv().is_ok() {}
                    }
                    Some(kind) => {
                        tracing::debug!("Ignoring {:?} failure", kind);
                    }
                    None => {
                        tracing::debug!("Failure channel closed; interval refresh only");
                        listening = false;
                    }
                },
            }
        }
    }

    /// Create the charts if they are still missing, then refresh them.
    async fn cycle(&self, state: &mut DashboardState) {
        if !state.has_charts() {
            if let Err(e) = self.refresh.bootstrap(state).await {
                tracing::error!("Error creating dashboard charts: {}", e);
            }
        }

        match self.refresh.refresh_history(state).await {
            RefreshOutcome::Refreshed { attempts, charts_updated } => {
                tracing::debug!(
                    "Refresh finished after {} attempt(s), charts updated: {}",
                    attempts,
                    charts_updated
                );
                // The platform answered again; create what the failed bootstrap left out
                if !state.has_charts() {
                    if let Err(e) = self.refresh.bootstrap(state).await {
                        tracing::error!("Error creating dashboard charts: {}", e);
                    }
                }
            }
            RefreshOutcome::GaveUp { attempts } => {
                tracing::warn!("Refresh abandoned after {} attempts; keeping stale charts", attempts);
            }
        }

        self.charts.send_replace(state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::refresh_service::tests::{service_with, RecordingSleeper, ScriptedSource};
    use crate::application::refresh_service::RefreshPolicy;
    use crate::domain::chart::CO2_AVOIDED_KEY;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_retry_worthy_failure_triggers_refresh() {
        let source = Arc::new(ScriptedSource::failing_for(0));
        let refresh = service_with(
            source.clone(),
            Arc::new(RecordingSleeper::default()),
            RefreshPolicy::default(),
        );
        let (failure_tx, failure_rx) = mpsc::channel(8);
        let (charts_tx, mut charts_rx) = watch::channel(DashboardState::default());

        let worker = DashboardWorker::new(refresh, Duration::from_secs(3600), failure_rx, charts_tx);
        let handle = tokio::spawn(worker.run());

        time::timeout(Duration::from_secs(5), charts_rx.changed())
            .await
            .unwrap()
            .unwrap();
        // Bootstrap plus the initial refresh
        assert_eq!(source.calls_for(CO2_AVOIDED_KEY), 2);
        assert_eq!(charts_rx.borrow().co2.as_ref().unwrap().revision, 1);

        failure_tx.send(FailureKind::Validation).await.unwrap();
        failure_tx.send(FailureKind::Auth).await.unwrap();

        time::timeout(Duration::from_secs(5), charts_rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.calls_for(CO2_AVOIDED_KEY), 3);
        assert_eq!(charts_rx.borrow().co2.as_ref().unwrap().revision, 2);

        handle.abort();
    }

    #[tokio::test]
    async fn test_failed_bootstrap_is_published_without_charts() {
        let source = Arc::new(ScriptedSource::always_failing());
        let refresh = service_with(
            source.clone(),
            Arc::new(RecordingSleeper::default()),
            RefreshPolicy {
                max_retries: 1,
                delay: Duration::from_millis(1),
            },
        );
        let (_failure_tx, failure_rx) = mpsc::channel(8);
        let (charts_tx, mut charts_rx) = watch::channel(DashboardState::default());

        let handle = tokio::spawn(
            DashboardWorker::new(refresh, Duration::from_secs(3600), failure_rx, charts_tx).run(),
        );

        time::timeout(Duration::from_secs(5), charts_rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!charts_rx.borrow().has_charts());
        // One bootstrap attempt plus two refresh attempts
        assert_eq!(source.calls_for(CO2_AVOIDED_KEY), 3);

        handle.abort();
    }

    fn quick_retries() -> RefreshPolicy {
        RefreshPolicy {
            max_retries: 1,
            delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_trigger_bootstraps_missing_charts() {
        // Bootstrap and both refresh attempts fail on start
        let source = Arc::new(ScriptedSource::failing_for(3));
        let refresh = service_with(
            source.clone(),
            Arc::new(RecordingSleeper::default()),
            quick_retries(),
        );
        let (failure_tx, failure_rx) = mpsc::channel(8);
        let (charts_tx, mut charts_rx) = watch::channel(DashboardState::default());

        let handle = tokio::spawn(
            DashboardWorker::new(refresh, Duration::from_secs(3600), failure_rx, charts_tx).run(),
        );

        time::timeout(Duration::from_secs(5), charts_rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(!charts_rx.borrow().has_charts());
        assert_eq!(source.calls_for(CO2_AVOIDED_KEY), 3);

        failure_tx.send(FailureKind::Upstream).await.unwrap();

        time::timeout(Duration::from_secs(5), charts_rx.changed())
            .await
            .unwrap()
            .unwrap();
        let charts = charts_rx.borrow().clone();
        assert!(charts.has_charts());
        assert_eq!(charts.co2.as_ref().unwrap().revision, 1);
        assert_eq!(source.calls_for(CO2_AVOIDED_KEY), 5);

        handle.abort();
    }

    #[tokio::test]
    async fn test_refresh_recovery_creates_missing_charts_in_same_cycle() {
        // Bootstrap and the first refresh attempt fail, the retry succeeds
        let source = Arc::new(ScriptedSource::failing_for(2));
        let refresh = service_with(
            source.clone(),
            Arc::new(RecordingSleeper::default()),
            quick_retries(),
        );
        let (_failure_tx, failure_rx) = mpsc::channel(8);
        let (charts_tx, mut charts_rx) = watch::channel(DashboardState::default());

        let handle = tokio::spawn(
            DashboardWorker::new(refresh, Duration::from_secs(3600), failure_rx, charts_tx).run(),
        );

        time::timeout(Duration::from_secs(5), charts_rx.changed())
            .await
            .unwrap()
            .unwrap();
        let charts = charts_rx.borrow().clone();
        assert!(charts.has_charts());
        assert_eq!(charts.co2.as_ref().unwrap().revision, 0);
        assert_eq!(charts.energy.as_ref().unwrap().revision, 1);
        assert_eq!(source.calls_for(CO2_AVOIDED_KEY), 4);

        handle.abort();
    }

    #[tokio::test]
    async fn test_interval_tick_refreshes_charts() {
        let source = Arc::new(ScriptedSource::failing_for(0));
        let refresh = service_with(
            source.clone(),
            Arc::new(RecordingSleeper::default()),
            RefreshPolicy::default(),
        );
        let (_failure_tx, failure_rx) = mpsc::channel(8);
        let (charts_tx, mut charts_rx) = watch::channel(DashboardState::default());

        let handle = tokio::spawn(
            DashboardWorker::new(refresh, Duration::from_millis(50), failure_rx, charts_tx).run(),
        );

        time::timeout(
            Duration::from_secs(5),
            charts_rx.wait_for(|s| s.co2.as_ref().is_some_and(|c| c.revision >= 2)),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(source.calls_for(CO2_AVOIDED_KEY) >= 3);

        handle.abort();
    }

    #[tokio::test]
    async fn test_queued_failures_share_one_refresh() {
        let source = Arc::new(ScriptedSource::failing_for(0));
        let refresh = service_with(
            source.clone(),
            Arc::new(RecordingSleeper::default()),
            RefreshPolicy::default(),
        );
        let (failure_tx, failure_rx) = mpsc::channel(8);
        let (charts_tx, mut charts_rx) = watch::channel(DashboardState::default());

        // Queued before the worker starts, so all of them wait behind the first cycle
        for kind in [
            FailureKind::Upstream,
            FailureKind::Auth,
            FailureKind::Transport,
            FailureKind::Upstream,
        ] {
            failure_tx.send(kind).await.unwrap();
        }

        let handle = tokio::spawn(
            DashboardWorker::new(refresh, Duration::from_secs(3600), failure_rx, charts_tx).run(),
        );

        time::timeout(
            Duration::from_secs(5),
            charts_rx.wait_for(|s| s.co2.as_ref().is_some_and(|c| c.revision >= 2)),
        )
        .await
        .unwrap()
        .unwrap();
        time::sleep(Duration::from_millis(100)).await;

        // Bootstrap, the initial refresh and a single triggered refresh
        assert_eq!(source.calls_for(CO2_AVOIDED_KEY), 3);
        assert_eq!(charts_rx.borrow().co2.as_ref().unwrap().revision, 2);
        assert_eq!(failure_tx.capacity(), 8);

        handle.abort();
    }
}
