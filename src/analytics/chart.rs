//! Chart series construction

use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::datetime::{Calendar, UNDEFINED_INSTANT};
use crate::models::{ChartPeriod, Reading};

/// Number of day buckets in a `Month` series
pub const MONTH_BUCKETS: u64 = 30;

/// One bucket of a chart series. `value` is `None` when the bucket has no data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: Option<f64>,
}

/// Ordered buckets ready for a bar or line chart
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChartSeries {
    pub points: Vec<ChartPoint>,
}

impl ChartSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.points.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Build the series for readings already filtered for `period`.
///
/// * `Week`: one bucket per reading, oldest first, labelled "Record N" plus the date.
/// * `Month`: exactly 30 day buckets ending on the latest reading's day (today
///   when there is none), each the mean of that day's readings.
/// * `Year`: one bucket per reading in chronological order.
pub fn build_chart_series(
    filtered: &[Reading],
    period: ChartPeriod,
    now: NaiveDateTime,
    calendar: &Calendar,
) -> ChartSeries {
    tracing::debug!(
        "Processing chart data for period: {} with {} readings",
        period.as_str(),
        filtered.len()
    );

    let points = match period {
        ChartPeriod::Week => record_buckets(filtered, calendar),
        ChartPeriod::Month => day_buckets(filtered, now, calendar),
        ChartPeriod::Year => chronological_buckets(filtered, calendar),
    };

    ChartSeries { points }
}

/// Filtered readings arrive newest first; the chart reads left to right
fn record_buckets(filtered: &[Reading], calendar: &Calendar) -> Vec<ChartPoint> {
    filtered
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, reading)| {
            let at = calendar.parse_timestamp(reading.timestamp);
            let label = if at == UNDEFINED_INSTANT {
                format!("Record {}", idx + 1)
            } else {
                format!("Record {}\n{}", idx + 1, calendar.chart_date(at))
            };
            ChartPoint {
                label,
                value: Some(reading.glucose_level),
            }
        })
        .collect()
}

fn day_buckets(filtered: &[Reading], now: NaiveDateTime, calendar: &Calendar) -> Vec<ChartPoint> {
    let end_date = filtered
        .iter()
        .max_by_key(|reading| reading.timestamp)
        .map(|reading| calendar.parse_timestamp(reading.timestamp))
        .filter(|at| *at != UNDEFINED_INSTANT)
        .unwrap_or(now)
        .date();

    // Group by local day: (sum, count)
    let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for reading in filtered {
        let at = calendar.parse_timestamp(reading.timestamp);
        if at == UNDEFINED_INSTANT {
            continue;
        }
        let entry = by_day.entry(at.date()).or_insert((0.0, 0));
        entry.0 += reading.glucose_level;
        entry.1 += 1;
    }

    // Near the bottom of the calendar the window starts at the first
    // representable day instead of shrinking
    let start_date = end_date
        .checked_sub_days(Days::new(MONTH_BUCKETS - 1))
        .unwrap_or(NaiveDate::MIN);

    start_date
        .iter_days()
        .take(MONTH_BUCKETS as usize)
        .map(|day| ChartPoint {
            label: calendar.chart_day(day),
            value: by_day.get(&day).map(|(sum, count)| sum / *count as f64),
        })
        .collect()
}

fn chronological_buckets(filtered: &[Reading], calendar: &Calendar) -> Vec<ChartPoint> {
    let mut sorted: Vec<&Reading> = filtered.iter().collect();
    sorted.sort_by_key(|reading| reading.timestamp);

    sorted
        .into_iter()
        .map(|reading| {
            let at = calendar.parse_timestamp(reading.timestamp);
            let label = if at == UNDEFINED_INSTANT {
                "Entry".to_string()
            } else {
                calendar.chart_date(at)
            };
            ChartPoint {
                label,
                value: Some(reading.glucose_level),
            }
        })
        .collect()
}
