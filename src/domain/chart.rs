// Chart state kept by the dashboard and handed to the charting front end
use serde::Serialize;

use super::monthly::MonthlyBucketSeries;

pub const CO2_AVOIDED_KEY: &str = "co2evitado";
pub const CO2_EMITTED_KEY: &str = "co2emitido";
pub const ENERGY_SOLAR_KEY: &str = "energiasolarconsumida";
pub const ENERGY_GRID_KEY: &str = "energiaredeconsumida";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub key: String,
    pub label: String,
    pub data: Vec<f64>,
}

/// `{labels, datasets: [{data}, ...]}` as the charting library expects it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    /// Bumped on every in-place update; clients redraw when it changes
    pub revision: u64,
}

impl ChartData {
    fn new(series: &[(&MonthlyBucketSeries, &str)]) -> Self {
        let labels = series
            .first()
            .map(|(s, _)| s.labels.clone())
            .unwrap_or_default();
        let datasets = series
            .iter()
            .map(|(s, label)| Dataset {
                key: s.metric_key.clone(),
                label: label.to_string(),
                data: s.values.clone(),
            })
            .collect();

        Self {
            labels,
            datasets,
            revision: 0,
        }
    }

    /// Replace labels and dataset values; previous data is dropped, not merged.
    fn update(&mut self, series: &[&MonthlyBucketSeries]) {
        if let Some(first) = series.first() {
            self.labels = first.labels.clone();
        }
        for (dataset, s) in self.datasets.iter_mut().zip(series) {
            dataset.data = s.values.clone();
        }
        self.revision += 1;
    }
}

/// The four aggregated series produced by one refresh cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSeries {
    pub co2_avoided: MonthlyBucketSeries,
    pub co2_emitted: MonthlyBucketSeries,
    pub energy_solar: MonthlyBucketSeries,
    pub energy_grid: MonthlyBucketSeries,
}

/// Long-lived chart handles.
///
/// Charts are created once on the first successful load and mutated in place
/// afterwards; they are never recreated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardState {
    pub co2: Option<ChartData>,
    pub energy: Option<ChartData>,
}

impl DashboardState {
    pub fn has_charts(&self) -> bool {
        self.co2.is_some() && self.energy.is_some()
    }

    /// Create the CO₂ chart unless it already exists. Returns whether it was created.
    pub fn create_co2_chart(
        &mut self,
        avoided: &MonthlyBucketSeries,
        emitted: &MonthlyBucketSeries,
    ) -> bool {
        if self.co2.is_some() {
            return false;
        }
        self.co2 = Some(ChartData::new(&[
            (avoided, "CO₂ Evitado (ton)"),
            (emitted, "CO₂ Emitido (ton)"),
        ]));
        true
    }

    /// Create the energy chart unless it already exists. Returns whether it was created.
    pub fn create_energy_chart(
        &mut self,
        solar: &MonthlyBucketSeries,
        grid: &MonthlyBucketSeries,
    ) -> bool {
        if self.energy.is_some() {
            return false;
        }
        self.energy = Some(ChartData::new(&[
            (solar, "Energia Solar (kWh)"),
            (grid, "Energia Rede (kWh)"),
        ]));
        true
    }

    /// Update existing charts in place. Returns whether anything changed.
    pub fn update_charts(&mut self, series: &DashboardSeries) -> bool {
        let mut updated = false;

        if let Some(chart) = self.co2.as_mut() {
            chart.update(&[&series.co2_avoided, &series.co2_emitted]);
            updated = true;
        }
        if let Some(chart) = self.energy.as_mut() {
            chart.update(&[&series.energy_solar, &series.energy_grid]);
            updated = true;
        }

        updated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(key: &str, fill: f64) -> MonthlyBucketSeries {
        MonthlyBucketSeries {
            metric_key: key.to_string(),
            labels: (1..=12).map(|m| format!("m{m}")).collect(),
            values: vec![fill; 12],
        }
    }

    fn dashboard_series(fill: f64) -> DashboardSeries {
        DashboardSeries {
            co2_avoided: series(CO2_AVOIDED_KEY, fill),
            co2_emitted: series(CO2_EMITTED_KEY, fill + 1.0),
            energy_solar: series(ENERGY_SOLAR_KEY, fill + 2.0),
            energy_grid: series(ENERGY_GRID_KEY, fill + 3.0),
        }
    }

    #[test]
    fn test_update_without_charts_does_nothing() {
        let mut state = DashboardState::default();
        assert!(!state.update_charts(&dashboard_series(1.0)));
        assert_eq!(state, DashboardState::default());
    }

    fn create_both(state: &mut DashboardState, series: &DashboardSeries) {
        state.create_co2_chart(&series.co2_avoided, &series.co2_emitted);
        state.create_energy_chart(&series.energy_solar, &series.energy_grid);
    }

    #[test]
    fn test_create_charts_once() {
        let mut state = DashboardState::default();
        create_both(&mut state, &dashboard_series(1.0));
        assert!(state.has_charts());

        let co2 = state.co2.as_ref().unwrap();
        assert_eq!(co2.datasets.len(), 2);
        assert_eq!(co2.datasets[0].key, CO2_AVOIDED_KEY);
        assert_eq!(co2.datasets[1].data, vec![2.0; 12]);

        // A second bootstrap must not replace the existing handles
        let again = dashboard_series(9.0);
        assert!(!state.create_co2_chart(&again.co2_avoided, &again.co2_emitted));
        assert_eq!(state.co2.as_ref().unwrap().datasets[0].data, vec![1.0; 12]);
    }

    #[test]
    fn test_charts_are_created_independently() {
        let series = dashboard_series(1.0);
        let mut state = DashboardState::default();

        assert!(state.create_energy_chart(&series.energy_solar, &series.energy_grid));
        assert!(state.co2.is_none());
        assert!(!state.has_charts());

        // Only the existing chart is updated
        assert!(state.update_charts(&dashboard_series(2.0)));
        assert_eq!(state.energy.as_ref().unwrap().revision, 1);
        assert!(state.co2.is_none());
    }

    #[test]
    fn test_update_overwrites_previous_data() {
        let mut state = DashboardState::default();
        create_both(&mut state, &dashboard_series(1.0));

        let mut next = dashboard_series(5.0);
        next.energy_solar.labels[0] = "changed".to_string();
        assert!(state.update_charts(&next));

        let energy = state.energy.as_ref().unwrap();
        assert_eq!(energy.labels[0], "changed");
        assert_eq!(energy.datasets[0].data, vec![7.0; 12]);
        assert_eq!(energy.datasets[1].data, vec![8.0; 12]);
        assert_eq!(energy.revision, 1);
        assert_eq!(state.co2.as_ref().unwrap().datasets[0].data, vec![5.0; 12]);
    }
}
