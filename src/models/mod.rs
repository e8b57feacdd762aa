//! Data models
//!
//! Rust structs representing stored readings and reporting periods.

mod period;
mod reading;

pub use period::{ChartKind, ChartPeriod};
pub use reading::{
    normalize_notes, validate_glucose_level, GlucoseRange, MealContext, Reading, ReadingCreate,
    ReadingUpdate, HIGH_THRESHOLD, LOW_THRESHOLD, MAX_GLUCOSE_LEVEL,
};
