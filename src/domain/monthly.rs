// Monthly aggregation of raw samples into chart-ready series
use chrono::{DateTime, Datelike, Duration, Locale, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use serde::Serialize;

use super::telemetry::RawSample;

/// Number of calendar months shown on the history charts.
pub const TRAILING_MONTHS: usize = 12;

/// Twelve labelled monthly sums for one metric key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyBucketSeries {
    pub metric_key: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Inclusive millisecond range covering whole calendar months.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_ts: i64,
    pub end_ts: i64,
}

impl TimeWindow {
    /// From the first millisecond of `months - 1` months ago to the last
    /// millisecond of the current month, in `now`'s time zone.
    pub fn trailing_months<Tz: TimeZone>(now: &DateTime<Tz>, months: u32) -> Self {
        let tz = now.timezone();
        let current = month_index(now.year(), now.month());
        let first = current - months.saturating_sub(1) as i32;

        Self {
            start_ts: month_start_millis(&tz, first),
            end_ts: month_start_millis(&tz, current + 1) - 1,
        }
    }
}

/// Sum samples into the trailing twelve calendar months ending at `now`.
///
/// The window is anchored to `now`, not to the samples: samples outside it
/// and samples without a numeric value are ignored, and empty months stay 0.
/// Per-month sums are computed over sorted values so the result does not
/// depend on input order.
pub fn bucket_by_month<Tz: TimeZone>(
    samples: &[RawSample],
    metric_key: &str,
    now: &DateTime<Tz>,
    locale: Locale,
) -> MonthlyBucketSeries {
    let tz = now.timezone();
    let current = month_index(now.year(), now.month());
    let first = current - (TRAILING_MONTHS as i32 - 1);

    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); TRAILING_MONTHS];
    let mut skipped = 0usize;

    for sample in samples {
        let Some(value) = sample.numeric_value() else {
            skipped += 1;
            continue;
        };
        let Some(at) = tz.timestamp_millis_opt(sample.ts).single() else {
            skipped += 1;
            continue;
        };

        let offset = month_index(at.year(), at.month()) - first;
        if (0..TRAILING_MONTHS as i32).contains(&offset) {
            buckets[offset as usize].push(value);
        }
    }

    if skipped > 0 {
        tracing::debug!("Skipped {} unusable samples for {}", skipped, metric_key);
    }

    let values: Vec<f64> = buckets
        .into_iter()
        .map(|mut bucket| {
            bucket.sort_by(f64::total_cmp);
            bucket.into_iter().sum::<f64>()
        })
        .collect();

    let labels: Vec<String> = (first..=current).map(|m| month_label(m, locale)).collect();

    MonthlyBucketSeries {
        metric_key: metric_key.to_string(),
        labels,
        values,
    }
}

fn month_index(year: i32, month: u32) -> i32 {
    year * 12 + month as i32 - 1
}

fn month_start(index: i32) -> NaiveDateTime {
    let year = index.div_euclid(12);
    let month = index.rem_euclid(12) as u32 + 1;
    NaiveDate::from_ymd_opt(year, month, 1)
        .unwrap_or_default()
        .and_time(NaiveTime::MIN)
}

fn month_start_millis<Tz: TimeZone>(tz: &Tz, index: i32) -> i64 {
    let naive = month_start(index);
    // Midnight can fall into a DST gap in a few zones; take the first valid hour
    (0..=2)
        .find_map(|hours| {
            tz.from_local_datetime(&(naive + Duration::hours(hours)))
                .earliest()
        })
        .map(|at| at.timestamp_millis())
        .unwrap_or_else(|| naive.and_utc().timestamp_millis())
}

fn month_label(index: i32, locale: Locale) -> String {
    month_start(index)
        .and_utc()
        .format_localized("%b", locale)
        .to_string()
}
