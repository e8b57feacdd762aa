//! Per-period reports and the aggregator facade

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

use super::chart::{build_chart_series, ChartSeries};
use super::datetime::{Calendar, Clock, SystemClock};
use super::filter::filter_by_period;
use super::stats::{compute_statistics, StatisticsSummary};
use crate::models::{ChartKind, ChartPeriod, Reading};

/// Days without a reading before the all-records view asks for a new test
pub const STALE_AFTER_DAYS: i64 = 7;

/// Everything a chart section needs for one period
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub period: ChartPeriod,
    pub display_name: &'static str,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub chart_kind: ChartKind,
    pub series: ChartSeries,
    pub statistics: StatisticsSummary,
    pub stale_warning: Option<String>,
}

/// Runs filtering, bucketing, and statistics against a clock and calendar
#[derive(Clone)]
pub struct ChartAggregator {
    clock: Arc<dyn Clock>,
    calendar: Calendar,
}

impl ChartAggregator {
    pub fn new(clock: Arc<dyn Clock>, calendar: Calendar) -> Self {
        Self { clock, calendar }
    }

    /// System clock, local time zone
    pub fn system() -> Self {
        Self::new(Arc::new(SystemClock), Calendar::local())
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    pub fn now(&self) -> NaiveDateTime {
        self.calendar.now(self.clock.as_ref())
    }

    pub fn filter_by_period(&self, readings: &[Reading], period: ChartPeriod) -> Vec<Reading> {
        filter_by_period(readings, period, self.now(), &self.calendar)
    }

    pub fn build_chart_series(&self, filtered: &[Reading], period: ChartPeriod) -> ChartSeries {
        build_chart_series(filtered, period, self.now(), &self.calendar)
    }

    pub fn compute_statistics(&self, filtered: &[Reading]) -> StatisticsSummary {
        compute_statistics(filtered, self.now(), &self.calendar)
    }

    /// Filter once, then build the series and statistics from the same set
    pub fn period_report(&self, readings: &[Reading], period: ChartPeriod) -> PeriodReport {
        let now = self.now();
        let filtered = filter_by_period(readings, period, now, &self.calendar);
        let series = build_chart_series(&filtered, period, now, &self.calendar);
        let statistics = compute_statistics(&filtered, now, &self.calendar);

        let stale_warning = (period == ChartPeriod::Year
            && statistics.days_since_last_reading > STALE_AFTER_DAYS)
            .then(|| {
                format!(
                    "Need to test Blood Sugar - Last reading was {} days ago",
                    statistics.days_since_last_reading
                )
            });

        PeriodReport {
            period,
            display_name: period.display_name(),
            title: period.title(),
            subtitle: period.subtitle(),
            chart_kind: period.chart_kind(),
            series,
            statistics,
            stale_warning,
        }
    }
}
