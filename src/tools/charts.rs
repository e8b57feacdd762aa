//! Chart MCP Tools
//!
//! Chart series, statistics and the dashboard view for the signed-in user.

use serde::Serialize;

use crate::analytics::{ChartPoint, PeriodReport, StatisticsSummary};
use crate::models::{ChartKind, ChartPeriod};
use crate::service::ReadingsService;
use crate::tools::readings::ReadingSummary;

/// Response for get_chart
#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub period: ChartPeriod,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub chart_kind: ChartKind,
    pub points: Vec<ChartPoint>,
    /// Buckets with a value (MONTH gaps are null)
    pub populated_points: usize,
}

/// Response for get_statistics
#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub period: ChartPeriod,
    pub display_name: &'static str,
    #[serde(flatten)]
    pub statistics: StatisticsSummary,
}

/// Response for get_dashboard
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub user_name: Option<String>,
    pub total_readings: usize,
    pub latest_reading: Option<ReadingSummary>,
    pub from_cache: bool,
    pub error_message: Option<String>,
    pub reports: Vec<PeriodReport>,
}

/// Parse a period argument, defaulting to WEEK
pub fn parse_period(value: Option<&str>) -> Result<ChartPeriod, String> {
    match value {
        None => Ok(ChartPeriod::Week),
        Some(s) => ChartPeriod::from_str(s)
            .ok_or_else(|| format!("Invalid period: '{}'. Valid periods: week, month, year", s)),
    }
}

/// Make sure the service has data before reporting. The first call after
/// startup or sign-in loads from the store.
async fn ensure_loaded(service: &ReadingsService) {
    if service.readings().is_empty() {
        service.load_readings().await;
    }
}

/// Chart series for one period
pub async fn get_chart(
    service: &ReadingsService,
    period: Option<&str>,
) -> Result<ChartResponse, String> {
    let period = parse_period(period)?;
    ensure_loaded(service).await;

    let report = service.period_report(period);
    let populated_points = report.series.points.iter().filter(|p| p.value.is_some()).count();

    Ok(ChartResponse {
        period,
        title: report.title,
        subtitle: report.subtitle,
        chart_kind: report.chart_kind,
        points: report.series.points,
        populated_points,
    })
}

/// Summary statistics for one period
pub async fn get_statistics(
    service: &ReadingsService,
    period: Option<&str>,
) -> Result<StatisticsResponse, String> {
    let period = parse_period(period)?;
    ensure_loaded(service).await;

    let report = service.period_report(period);
    Ok(StatisticsResponse {
        period,
        display_name: report.display_name,
        statistics: report.statistics,
    })
}

/// Series, statistics and staleness warning for one period
pub async fn get_period_report(
    service: &ReadingsService,
    period: Option<&str>,
) -> Result<PeriodReport, String> {
    let period = parse_period(period)?;
    ensure_loaded(service).await;
    Ok(service.period_report(period))
}

/// Everything the home screen shows
pub async fn get_dashboard(service: &ReadingsService) -> Result<DashboardResponse, String> {
    let state = service.load_readings().await;
    if state.readings.is_empty() {
        if let Some(err) = &state.error_message {
            return Err(format!("Failed to load readings: {}", err));
        }
    }

    let aggregator = service.aggregator();
    let latest_reading = state
        .readings
        .first()
        .map(|r| ReadingSummary::new(r, aggregator.calendar(), aggregator.now_millis()));

    Ok(DashboardResponse {
        user_name: service.cached_user_name(),
        total_readings: state.readings.len(),
        latest_reading,
        from_cache: state.from_cache,
        error_message: state.error_message,
        reports: service.dashboard(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::analytics::{Calendar, ChartAggregator, FixedClock};
    use crate::cache::MemoryStore;
    use crate::models::MealContext;
    use crate::repository::{MemoryReadingRepository, Session};

    // 2024-03-15T12:00:00Z
    const NOW_MS: i64 = 1_710_504_000_000;
    const DAY_MS: i64 = 86_400_000;

    async fn seeded_service() -> ReadingsService {
        let session = Session::signed_in("alice");
        let service = ReadingsService::new(
            Arc::new(MemoryReadingRepository::new(session.clone())),
            Arc::new(MemoryStore::new()),
            session,
            ChartAggregator::new(Arc::new(FixedClock(NOW_MS)), Calendar::utc()),
        );
        for (glucose, days_back) in [(100.0, 9), (150.0, 10), (200.0, 40)] {
            service
                .add_reading(
                    glucose,
                    None,
                    MealContext::BeforeMeal,
                    Some(NOW_MS - days_back * DAY_MS),
                )
                .await
                .unwrap();
        }
        service
    }

    #[test]
    fn test_parse_period() {
        assert_eq!(parse_period(None), Ok(ChartPeriod::Week));
        assert_eq!(parse_period(Some("Month")), Ok(ChartPeriod::Month));
        assert!(parse_period(Some("decade")).is_err());
    }

    #[tokio::test]
    async fn test_month_chart_has_gaps() {
        let service = seeded_service().await;
        let chart = get_chart(&service, Some("month")).await.unwrap();
        assert_eq!(chart.points.len(), 30);
        assert_eq!(chart.populated_points, 2);
        assert_eq!(chart.chart_kind, ChartKind::Line);
    }

    #[tokio::test]
    async fn test_week_statistics() {
        let service = seeded_service().await;
        let stats = get_statistics(&service, Some("week")).await.unwrap();
        assert_eq!(stats.statistics.count, 3);
        assert_eq!(stats.statistics.max, 200.0);
        assert_eq!(stats.statistics.high_count, 1);
        assert_eq!(stats.statistics.days_since_last_reading, 9);
    }

    #[tokio::test]
    async fn test_year_report_warns_when_stale() {
        let service = seeded_service().await;
        let report = get_period_report(&service, Some("year")).await.unwrap();
        assert_eq!(
            report.stale_warning.as_deref(),
            Some("Need to test Blood Sugar - Last reading was 9 days ago")
        );
    }

    #[tokio::test]
    async fn test_dashboard() {
        let service = seeded_service().await;
        service.cache_user_name("Alice");
        let dashboard = get_dashboard(&service).await.unwrap();
        assert_eq!(dashboard.user_name.as_deref(), Some("Alice"));
        assert_eq!(dashboard.total_readings, 3);
        assert_eq!(dashboard.latest_reading.unwrap().glucose_level, 100.0);
        assert_eq!(dashboard.reports.len(), 3);
    }
}
