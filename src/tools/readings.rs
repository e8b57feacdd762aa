//! Reading MCP Tools
//!
//! Tools for recording, listing, editing and deleting blood sugar readings.

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::Calendar;
use crate::models::{MealContext, Reading, ReadingUpdate};
use crate::service::{ReadingsService, ReadingsState};

/// Reading summary for listing
#[derive(Debug, Serialize)]
pub struct ReadingSummary {
    pub id: Option<String>,
    pub glucose_level: f64,
    pub value_formatted: String,
    pub range: String,
    pub meal_context: String,
    pub meal_context_display: String,
    pub timestamp: i64,
    pub date_time: String,
    pub short_date: String,
    pub time: String,
    pub relative_time: String,
    pub is_today: bool,
    pub notes: Option<String>,
}

impl ReadingSummary {
    pub fn new(reading: &Reading, calendar: &Calendar, now_millis: i64) -> Self {
        Self {
            id: reading.id.clone(),
            glucose_level: reading.glucose_level,
            value_formatted: reading.format_value(),
            range: reading.range().display_name().to_string(),
            meal_context: reading.meal_context.as_str().to_string(),
            meal_context_display: reading.meal_context.display_name().to_string(),
            timestamp: reading.timestamp,
            date_time: calendar.format_date_time(reading.timestamp),
            short_date: calendar.format_short_date(reading.timestamp),
            time: calendar.format_time(reading.timestamp),
            relative_time: calendar.relative_time(reading.timestamp, now_millis),
            is_today: calendar.is_today(reading.timestamp, now_millis),
            notes: reading.notes.clone(),
        }
    }
}

/// Response for add_reading
#[derive(Debug, Serialize)]
pub struct AddReadingResponse {
    pub reading: ReadingSummary,
    pub total_readings: usize,
}

/// Response for list_readings and refresh_readings
#[derive(Debug, Serialize)]
pub struct ListReadingsResponse {
    pub readings: Vec<ReadingSummary>,
    pub total: usize,
    pub from_cache: bool,
    pub error_message: Option<String>,
}

/// Response for list_readings_by_date_range
#[derive(Debug, Serialize)]
pub struct DateRangeResponse {
    pub start_date: String,
    pub end_date: String,
    pub readings: Vec<ReadingSummary>,
    pub total: usize,
    pub average_glucose: Option<f64>,
}

/// Response for update_reading
#[derive(Debug, Serialize)]
pub struct UpdateReadingResponse {
    pub success: bool,
    pub reading: ReadingSummary,
}

/// Response for delete operations
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub deleted_id: String,
}

fn summarize(service: &ReadingsService, readings: &[Reading]) -> Vec<ReadingSummary> {
    let calendar = service.aggregator().calendar();
    let now = service.aggregator().now_millis();
    readings
        .iter()
        .map(|r| ReadingSummary::new(r, calendar, now))
        .collect()
}

fn list_response(
    service: &ReadingsService,
    state: ReadingsState,
    limit: Option<usize>,
    days: Option<u64>,
) -> ListReadingsResponse {
    let readings = match days {
        Some(n) => {
            let aggregator = service.aggregator();
            match aggregator.calendar().days_ago(n, aggregator.now_millis()) {
                Some(cutoff) => state
                    .readings
                    .into_iter()
                    .filter(|r| r.timestamp >= cutoff)
                    .collect(),
                None => state.readings,
            }
        }
        None => state.readings,
    };

    let total = readings.len();
    let shown = match limit {
        Some(n) => &readings[..n.min(total)],
        None => &readings[..],
    };
    ListReadingsResponse {
        readings: summarize(service, shown),
        total,
        from_cache: state.from_cache,
        error_message: state.error_message,
    }
}

fn parse_meal_context(value: Option<&str>) -> Result<Option<MealContext>, String> {
    match value {
        None => Ok(None),
        Some(s) => MealContext::from_str(s).map(Some).ok_or_else(|| {
            format!(
                "Invalid meal context: '{}'. Valid values: before_meal, after_meal",
                s
            )
        }),
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD", value))
}

// ============================================================================
// Tool Functions
// ============================================================================

/// Record a new reading for the signed-in user
pub async fn add_reading(
    service: &ReadingsService,
    glucose_level: f64,
    meal_context: Option<&str>,
    notes: Option<&str>,
    timestamp: Option<i64>,
) -> Result<AddReadingResponse, String> {
    let context = parse_meal_context(meal_context)?.unwrap_or_default();

    let reading = service
        .add_reading(glucose_level, notes.map(String::from), context, timestamp)
        .await
        .map_err(|e| format!("Failed to add reading: {}", e))?;

    let calendar = service.aggregator().calendar();
    Ok(AddReadingResponse {
        reading: ReadingSummary::new(&reading, calendar, service.aggregator().now_millis()),
        total_readings: service.readings().len(),
    })
}

/// List the user's readings, newest first, optionally only those from the
/// last `days` days. Falls back to the cached list when the store cannot be
/// reached.
pub async fn list_readings(
    service: &ReadingsService,
    limit: Option<usize>,
    days: Option<u64>,
) -> Result<ListReadingsResponse, String> {
    let state = service.load_readings().await;
    if state.readings.is_empty() {
        if let Some(err) = &state.error_message {
            return Err(format!("Failed to load readings: {}", err));
        }
    }
    Ok(list_response(service, state, limit, days))
}

/// Re-fetch without falling back to the cache
pub async fn refresh_readings(service: &ReadingsService) -> Result<ListReadingsResponse, String> {
    let state = service.refresh_readings().await;
    Ok(list_response(service, state, None, None))
}

/// Readings between two local calendar dates, both inclusive
pub async fn list_readings_by_date_range(
    service: &ReadingsService,
    start_date: &str,
    end_date: &str,
) -> Result<DateRangeResponse, String> {
    let start = parse_date(start_date)?;
    let end = parse_date(end_date)?;
    if end < start {
        return Err(format!(
            "End date {} is before start date {}",
            end_date, start_date
        ));
    }

    let calendar = service.aggregator().calendar();
    let start_ms = calendar
        .start_of_day(start)
        .ok_or_else(|| format!("Date out of range: {}", start_date))?;
    let end_ms = calendar
        .end_of_day(end)
        .ok_or_else(|| format!("Date out of range: {}", end_date))?;

    let readings = service
        .repository()
        .list_by_date_range(start_ms, end_ms)
        .await
        .map_err(|e| format!("Failed to list readings: {}", e))?;

    let statistics = service.aggregator().compute_statistics(&readings);
    let average_glucose = (statistics.count > 0).then_some(statistics.average);

    Ok(DateRangeResponse {
        start_date: start.format("%Y-%m-%d").to_string(),
        end_date: end.format("%Y-%m-%d").to_string(),
        total: readings.len(),
        readings: summarize(service, &readings),
        average_glucose,
    })
}

/// Change fields of an existing reading
pub async fn update_reading(
    service: &ReadingsService,
    id: &str,
    glucose_level: Option<f64>,
    timestamp: Option<i64>,
    notes: Option<&str>,
    meal_context: Option<&str>,
) -> Result<UpdateReadingResponse, String> {
    let update = ReadingUpdate {
        glucose_level,
        timestamp,
        notes: notes.map(String::from),
        meal_context: parse_meal_context(meal_context)?,
    };

    let reading = service
        .update_reading(id, &update)
        .await
        .map_err(|e| format!("Failed to update reading: {}", e))?;

    let calendar = service.aggregator().calendar();
    Ok(UpdateReadingResponse {
        success: true,
        reading: ReadingSummary::new(&reading, calendar, service.aggregator().now_millis()),
    })
}

/// Delete a reading
pub async fn delete_reading(
    service: &ReadingsService,
    id: &str,
) -> Result<DeleteResponse, String> {
    service
        .delete_reading(id)
        .await
        .map_err(|e| format!("Failed to delete reading: {}", e))?;

    Ok(DeleteResponse {
        success: true,
        deleted_id: id.to_string(),
    })
}
