//! Chart and statistics aggregation
//!
//! Pure functions over a snapshot of readings: period filtering, chart
//! bucketing and summary statistics. Nothing here fails; timestamps that cannot
//! be represented are replaced by [`UNDEFINED_INSTANT`].

pub mod chart;
pub mod datetime;
pub mod filter;
pub mod report;
pub mod stats;

pub use chart::{build_chart_series, ChartPoint, ChartSeries, MONTH_BUCKETS};
pub use datetime::{Calendar, Clock, FixedClock, SystemClock, UNDEFINED_INSTANT};
pub use filter::filter_by_period;
pub use report::{ChartAggregator, PeriodReport, STALE_AFTER_DAYS};
pub use stats::{compute_statistics, StatisticsSummary};
