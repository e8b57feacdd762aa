//! Period filtering

use std::cmp::Reverse;

use chrono::NaiveDateTime;

use super::datetime::{days_before, Calendar, UNDEFINED_INSTANT};
use crate::models::{ChartPeriod, Reading};

/// Readings belonging to a period, newest first.
///
/// `Week` takes the seven most recent readings no matter how old they are;
/// unparseable timestamps sort as oldest and may still be included. `Month`
/// and `Year` keep readings strictly after `now - period.days()` and drop
/// unparseable timestamps.
pub fn filter_by_period(
    readings: &[Reading],
    period: ChartPeriod,
    now: NaiveDateTime,
    calendar: &Calendar,
) -> Vec<Reading> {
    match period {
        ChartPeriod::Week => {
            let mut latest = newest_first(readings.to_vec(), calendar);
            latest.truncate(period.days() as usize);
            latest
        }
        ChartPeriod::Month | ChartPeriod::Year => {
            let cutoff = days_before(now, period.days());
            let in_window = readings
                .iter()
                .filter(|reading| {
                    let at = calendar.parse_timestamp(reading.timestamp);
                    at > cutoff && at != UNDEFINED_INSTANT
                })
                .cloned()
                .collect();
            newest_first(in_window, calendar)
        }
    }
}

/// Stable sort by parsed timestamp, descending
fn newest_first(mut readings: Vec<Reading>, calendar: &Calendar) -> Vec<Reading> {
    readings.sort_by_cached_key(|reading| Reverse(calendar.parse_timestamp(reading.timestamp)));
    readings
}
