//! Clock and calendar
//!
//! Readings carry epoch-millisecond timestamps. Bucketing by day and every
//! display label happen in local time, which here is a fixed UTC offset so the
//! same inputs always land in the same buckets.

use chrono::{
    DateTime, Days, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeDelta,
    TimeZone, Utc,
};

/// Stand-in for a timestamp that cannot be represented as a date-time.
/// Sorts before every real instant.
pub const UNDEFINED_INSTANT: NaiveDateTime = NaiveDateTime::MIN;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;
const TWO_DAYS_MS: i64 = 172_800_000;
const WEEK_MS: i64 = 604_800_000;
const MONTH_MS: i64 = 2_592_000_000;

/// Source of the current instant
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch
    fn now_millis(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock pinned to one instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Converts timestamps to local date-times and formats them for display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calendar {
    offset: FixedOffset,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::local()
    }
}

impl Calendar {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Offset of the host's local time zone as of now
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    /// Offset given in minutes east of UTC
    pub fn from_offset_minutes(minutes: i32) -> Option<Self> {
        minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .map(Self::new)
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Local date-time of a timestamp, or [`UNDEFINED_INSTANT`] when the
    /// timestamp is out of range
    pub fn parse_timestamp(&self, millis: i64) -> NaiveDateTime {
        match DateTime::<Utc>::from_timestamp_millis(millis) {
            Some(at) => at.with_timezone(&self.offset).naive_local(),
            None => {
                tracing::debug!("Failed to parse timestamp: {}", millis);
                UNDEFINED_INSTANT
            }
        }
    }

    /// Epoch milliseconds of a local date-time
    pub fn to_millis(&self, local: NaiveDateTime) -> Option<i64> {
        self.offset
            .from_local_datetime(&local)
            .single()
            .map(|at| at.timestamp_millis())
    }

    pub fn now(&self, clock: &dyn Clock) -> NaiveDateTime {
        self.parse_timestamp(clock.now_millis())
    }

    pub fn today(&self, clock: &dyn Clock) -> NaiveDate {
        self.now(clock).date()
    }

    /// "Jan 15"
    pub fn chart_date(&self, at: NaiveDateTime) -> String {
        at.format("%b %d").to_string()
    }

    /// "Jan 15" for a calendar day
    pub fn chart_day(&self, day: NaiveDate) -> String {
        day.format("%b %d").to_string()
    }

    /// "Jan 15, 2024"
    pub fn full_date(&self, at: NaiveDateTime) -> String {
        at.format("%b %d, %Y").to_string()
    }

    /// "Jan 15, 2024 at 10:30 AM"
    pub fn format_date_time(&self, millis: i64) -> String {
        self.parse_timestamp(millis)
            .format("%b %d, %Y at %I:%M %p")
            .to_string()
    }

    /// "Jan 15, 2024"
    pub fn format_date(&self, millis: i64) -> String {
        self.full_date(self.parse_timestamp(millis))
    }

    /// "10:30 AM"
    pub fn format_time(&self, millis: i64) -> String {
        self.parse_timestamp(millis).format("%I:%M %p").to_string()
    }

    /// "15/01/2024"
    pub fn format_short_date(&self, millis: i64) -> String {
        self.parse_timestamp(millis).format("%d/%m/%Y").to_string()
    }

    /// Human-friendly age of a timestamp ("Just now", "3 hours ago", ...).
    /// Anything a month or older falls back to the full date.
    pub fn relative_time(&self, millis: i64, now_millis: i64) -> String {
        let diff = now_millis.saturating_sub(millis);

        match diff {
            d if d < MINUTE_MS => "Just now".to_string(),
            d if d < HOUR_MS => format!("{} minutes ago", d / MINUTE_MS),
            d if d < DAY_MS => format!("{} hours ago", d / HOUR_MS),
            d if d < TWO_DAYS_MS => "Yesterday".to_string(),
            d if d < WEEK_MS => format!("{} days ago", d / DAY_MS),
            d if d < MONTH_MS => format!("{} weeks ago", d / WEEK_MS),
            _ => self.format_date(millis),
        }
    }

    pub fn is_today(&self, millis: i64, now_millis: i64) -> bool {
        let at = self.parse_timestamp(millis);
        at != UNDEFINED_INSTANT && at.date() == self.parse_timestamp(now_millis).date()
    }

    /// Local midnight of `day`
    pub fn start_of_day(&self, day: NaiveDate) -> Option<i64> {
        self.to_millis(day.and_time(NaiveTime::MIN))
    }

    /// Last millisecond (23:59:59.999) of `day`
    pub fn end_of_day(&self, day: NaiveDate) -> Option<i64> {
        let last = NaiveTime::from_hms_milli_opt(23, 59, 59, 999)?;
        self.to_millis(day.and_time(last))
    }

    /// Same local time `days` calendar days before `now_millis`
    pub fn days_ago(&self, days: u64, now_millis: i64) -> Option<i64> {
        let now = self.parse_timestamp(now_millis);
        now.checked_sub_days(Days::new(days))
            .and_then(|at| self.to_millis(at))
    }
}

/// `now` moved back by whole days, saturating at [`UNDEFINED_INSTANT`]
pub(crate) fn days_before(now: NaiveDateTime, days: i64) -> NaiveDateTime {
    TimeDelta::try_days(days)
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(UNDEFINED_INSTANT)
}
