//! Chart reporting periods

use serde::{Deserialize, Serialize};

/// How the rendering layer should draw a period's series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Bar,
    Line,
}

/// Reporting period for charts and statistics.
///
/// `Week` is record-count based: it always means the seven most recent
/// readings, however old they are. `Month` and `Year` are time windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChartPeriod {
    Week,
    Month,
    Year,
}

impl ChartPeriod {
    pub const ALL: [ChartPeriod; 3] = [ChartPeriod::Week, ChartPeriod::Month, ChartPeriod::Year];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChartPeriod::Week => "WEEK",
            ChartPeriod::Month => "MONTH",
            ChartPeriod::Year => "YEAR",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "week" | "7" | "last_7" | "records" => Some(ChartPeriod::Week),
            "month" | "30" | "last_30" => Some(ChartPeriod::Month),
            "year" | "365" | "all" => Some(ChartPeriod::Year),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChartPeriod::Week => "Last 7 Records",
            ChartPeriod::Month => "Last 30 Days",
            ChartPeriod::Year => "All Records",
        }
    }

    /// Lookback window in days (record count for `Week`)
    pub fn days(&self) -> i64 {
        match self {
            ChartPeriod::Week => 7,
            ChartPeriod::Month => 30,
            ChartPeriod::Year => 365,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ChartPeriod::Week => "Last 7 Records",
            ChartPeriod::Month => "Monthly Analysis",
            ChartPeriod::Year => "All Records",
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            ChartPeriod::Week => "Recent readings histogram",
            ChartPeriod::Month => "4-week progression",
            ChartPeriod::Year => "Complete history plot",
        }
    }

    pub fn chart_kind(&self) -> ChartKind {
        match self {
            ChartPeriod::Week => ChartKind::Bar,
            ChartPeriod::Month | ChartPeriod::Year => ChartKind::Line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_windows() {
        assert_eq!(ChartPeriod::Week.days(), 7);
        assert_eq!(ChartPeriod::Month.days(), 30);
        assert_eq!(ChartPeriod::Year.days(), 365);
    }

    #[test]
    fn test_period_from_str() {
        assert_eq!(ChartPeriod::from_str("WEEK"), Some(ChartPeriod::Week));
        assert_eq!(ChartPeriod::from_str(" month "), Some(ChartPeriod::Month));
        assert_eq!(ChartPeriod::from_str("all"), Some(ChartPeriod::Year));
        assert_eq!(ChartPeriod::from_str("fortnight"), None);
    }

    #[test]
    fn test_only_week_is_a_histogram() {
        assert_eq!(ChartPeriod::Week.chart_kind(), ChartKind::Bar);
        assert_eq!(ChartPeriod::Month.chart_kind(), ChartKind::Line);
        assert_eq!(ChartPeriod::Year.chart_kind(), ChartKind::Line);
    }
}
