//! Summary statistics

use chrono::NaiveDateTime;
use serde::Serialize;

use super::datetime::{Calendar, UNDEFINED_INSTANT};
use crate::models::{GlucoseRange, Reading};

/// Summary of a set of readings. All zeros (and empty dates) for no readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatisticsSummary {
    pub average: f64,
    pub max: f64,
    /// "MMM dd, yyyy" of the first reading at `max`, empty if unknown
    pub max_date: String,
    pub min: f64,
    pub min_date: String,
    pub count: usize,
    pub in_range_percentage: f64,
    pub low_count: usize,
    pub normal_count: usize,
    pub high_count: usize,
    pub days_since_last_reading: i64,
}

pub fn compute_statistics(
    readings: &[Reading],
    now: NaiveDateTime,
    calendar: &Calendar,
) -> StatisticsSummary {
    let Some((first, rest)) = readings.split_first() else {
        return StatisticsSummary::default();
    };

    let count = readings.len();
    let average = readings.iter().map(|r| r.glucose_level).sum::<f64>() / count as f64;

    // First reading wins ties on both extremes
    let mut max_reading = first;
    let mut min_reading = first;
    for reading in rest {
        if reading.glucose_level > max_reading.glucose_level {
            max_reading = reading;
        }
        if reading.glucose_level < min_reading.glucose_level {
            min_reading = reading;
        }
    }

    let (mut low_count, mut normal_count, mut high_count) = (0, 0, 0);
    for reading in readings {
        match reading.range() {
            GlucoseRange::Low => low_count += 1,
            GlucoseRange::Normal => normal_count += 1,
            GlucoseRange::High => high_count += 1,
        }
    }

    let in_range_percentage = normal_count as f64 / count as f64 * 100.0;

    let most_recent = readings
        .iter()
        .map(|r| calendar.parse_timestamp(r.timestamp))
        .max()
        .unwrap_or(UNDEFINED_INSTANT);
    let days_since_last_reading = if most_recent == UNDEFINED_INSTANT {
        0
    } else {
        now.signed_duration_since(most_recent).num_days()
    };

    StatisticsSummary {
        average,
        max: max_reading.glucose_level,
        max_date: reading_date(max_reading, calendar),
        min: min_reading.glucose_level,
        min_date: reading_date(min_reading, calendar),
        count,
        in_range_percentage,
        low_count,
        normal_count,
        high_count,
        days_since_last_reading,
    }
}

fn reading_date(reading: &Reading, calendar: &Calendar) -> String {
    let at = calendar.parse_timestamp(reading.timestamp);
    if at == UNDEFINED_INSTANT {
        String::new()
    } else {
        calendar.full_date(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::testing::{reading_at, DAY_MS, HOUR_MS, NOW_MS};

    fn now() -> NaiveDateTime {
        Calendar::utc().parse_timestamp(NOW_MS)
    }

    #[test]
    fn test_empty_summary_is_all_zero() {
        let stats = compute_statistics(&[], now(), &Calendar::utc());
        assert_eq!(stats, StatisticsSummary::default());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.in_range_percentage, 0.0);
        assert!(stats.max_date.is_empty() && stats.min_date.is_empty());
    }

    #[test]
    fn test_range_counts_with_inclusive_bounds() {
        let readings: Vec<Reading> = [60.0, 70.0, 120.0, 180.0, 190.0]
            .iter()
            .enumerate()
            .map(|(i, v)| reading_at(*v, NOW_MS - i as i64 * DAY_MS))
            .collect();
        let stats = compute_statistics(&readings, now(), &Calendar::utc());

        assert_eq!(stats.low_count, 1);
        assert_eq!(stats.normal_count, 3);
        assert_eq!(stats.high_count, 1);
        assert!((stats.in_range_percentage - 60.0).abs() < 1e-9);
        assert!((stats.average - 124.0).abs() < 1e-9);
        assert_eq!(stats.count, 5);
    }

    #[test]
    fn test_extremes_carry_their_dates() {
        let readings = vec![
            reading_at(110.0, NOW_MS),
            reading_at(210.0, NOW_MS - 10 * DAY_MS),
            reading_at(65.0, NOW_MS - 20 * DAY_MS),
            reading_at(210.0, NOW_MS - 2 * DAY_MS),
        ];
        let stats = compute_statistics(&readings, now(), &Calendar::utc());
        assert_eq!(stats.max, 210.0);
        assert_eq!(stats.max_date, "Mar 05, 2024");
        assert_eq!(stats.min, 65.0);
        assert_eq!(stats.min_date, "Feb 24, 2024");
    }

    #[test]
    fn test_unparseable_extreme_has_empty_date() {
        let readings = vec![reading_at(300.0, i64::MAX), reading_at(100.0, NOW_MS)];
        let stats = compute_statistics(&readings, now(), &Calendar::utc());
        assert_eq!(stats.max, 300.0);
        assert_eq!(stats.max_date, "");
        assert_eq!(stats.min_date, "Mar 15, 2024");
    }

    #[test]
    fn test_days_since_last_reading_truncates() {
        let readings = vec![
            reading_at(100.0, NOW_MS - 9 * DAY_MS - 23 * HOUR_MS),
            reading_at(100.0, NOW_MS - 30 * DAY_MS),
        ];
        let stats = compute_statistics(&readings, now(), &Calendar::utc());
        assert_eq!(stats.days_since_last_reading, 9);
    }

    #[test]
    fn test_days_since_ignores_unparseable() {
        let only_bad = vec![reading_at(100.0, i64::MIN)];
        let stats = compute_statistics(&only_bad, now(), &Calendar::utc());
        assert_eq!(stats.days_since_last_reading, 0);

        let mixed = vec![reading_at(100.0, i64::MIN), reading_at(100.0, NOW_MS - 3 * DAY_MS)];
        let stats = compute_statistics(&mixed, now(), &Calendar::utc());
        assert_eq!(stats.days_since_last_reading, 3);
    }
}
