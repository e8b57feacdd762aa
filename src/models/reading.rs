//! Blood sugar reading model
//!
//! A single glucose measurement with its meal context. Rows live in
//! `blood_sugar_readings` and are always scoped to the owning user.

use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbResult;

/// Lowest glucose value (mg/dL) considered in range
pub const LOW_THRESHOLD: f64 = 70.0;

/// Highest glucose value (mg/dL) considered in range
pub const HIGH_THRESHOLD: f64 = 180.0;

/// Exclusive upper bound accepted on entry
pub const MAX_GLUCOSE_LEVEL: f64 = 1000.0;

/// Whether the reading was taken before or after eating
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MealContext {
    #[default]
    BeforeMeal,
    AfterMeal,
}

impl MealContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealContext::BeforeMeal => "BEFORE_MEAL",
            MealContext::AfterMeal => "AFTER_MEAL",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "BEFORE_MEAL" | "BEFORE" | "FASTING" => Some(MealContext::BeforeMeal),
            "AFTER_MEAL" | "AFTER" | "POSTPRANDIAL" => Some(MealContext::AfterMeal),
            _ => None,
        }
    }

    /// Lenient parse used for stored values; unknown strings read as before-meal
    pub fn from_str_or_default(s: &str) -> Self {
        Self::from_str(s).unwrap_or_default()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MealContext::BeforeMeal => "Before Meal",
            MealContext::AfterMeal => "After Meal",
        }
    }
}

/// Range classification of a glucose value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GlucoseRange {
    Low,
    Normal,
    High,
}

impl GlucoseRange {
    /// Both thresholds are inclusive on the normal side
    pub fn classify(glucose_level: f64) -> Self {
        if glucose_level < LOW_THRESHOLD {
            GlucoseRange::Low
        } else if glucose_level > HIGH_THRESHOLD {
            GlucoseRange::High
        } else {
            GlucoseRange::Normal
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GlucoseRange::Low => "Low",
            GlucoseRange::Normal => "Normal",
            GlucoseRange::High => "High",
        }
    }
}

/// A blood sugar reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub id: Option<String>,
    pub user_id: String,
    /// mg/dL
    pub glucose_level: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub notes: Option<String>,
    #[serde(default)]
    pub meal_context: MealContext,
}

/// Data for creating a new reading; the owner comes from the session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadingCreate {
    pub glucose_level: f64,
    pub timestamp: i64,
    pub notes: Option<String>,
    pub meal_context: MealContext,
}

/// Partial update of a reading
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReadingUpdate {
    pub glucose_level: Option<f64>,
    pub timestamp: Option<i64>,
    pub notes: Option<String>,
    pub meal_context: Option<MealContext>,
}

/// Check a glucose value against the accepted entry range
pub fn validate_glucose_level(glucose_level: f64) -> Result<(), String> {
    if !glucose_level.is_finite() || glucose_level <= 0.0 {
        return Err("Glucose level must be greater than 0".to_string());
    }
    if glucose_level >= MAX_GLUCOSE_LEVEL {
        return Err(format!(
            "Glucose level must be less than {} mg/dL",
            MAX_GLUCOSE_LEVEL
        ));
    }
    Ok(())
}

/// Blank notes are stored as absent
pub fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes.filter(|n| !n.trim().is_empty())
}

impl Reading {
    /// Build a reading owned by `user_id` from a creation payload
    pub fn from_create(id: String, user_id: &str, data: ReadingCreate) -> Self {
        Self {
            id: Some(id),
            user_id: user_id.to_string(),
            glucose_level: data.glucose_level,
            timestamp: data.timestamp,
            notes: normalize_notes(data.notes),
            meal_context: data.meal_context,
        }
    }

    /// Copy of this reading with the update applied
    pub fn with_update(&self, data: &ReadingUpdate) -> Self {
        let mut updated = self.clone();
        if let Some(level) = data.glucose_level {
            updated.glucose_level = level;
        }
        if let Some(ts) = data.timestamp {
            updated.timestamp = ts;
        }
        if data.notes.is_some() {
            updated.notes = normalize_notes(data.notes.clone());
        }
        if let Some(ctx) = data.meal_context {
            updated.meal_context = ctx;
        }
        updated
    }

    pub fn range(&self) -> GlucoseRange {
        GlucoseRange::classify(self.glucose_level)
    }

    /// Create from a database row
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let meal_context: String = row.get("meal_context")?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            glucose_level: row.get("glucose_level")?,
            timestamp: row.get("timestamp")?,
            notes: row.get("notes")?,
            meal_context: MealContext::from_str_or_default(&meal_context),
        })
    }

    /// Insert a fully-formed reading
    pub fn insert(conn: &Connection, reading: &Reading) -> DbResult<()> {
        conn.execute(
            r#"
            INSERT INTO blood_sugar_readings (id, user_id, glucose_level, timestamp, notes, meal_context)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                reading.id,
                reading.user_id,
                reading.glucose_level,
                reading.timestamp,
                reading.notes,
                reading.meal_context.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Get a reading by ID regardless of owner
    pub fn get_by_id(conn: &Connection, id: &str) -> DbResult<Option<Self>> {
        let mut stmt = conn.prepare("SELECT * FROM blood_sugar_readings WHERE id = ?1")?;

        let result = stmt.query_row([id], Self::from_row);
        match result {
            Ok(reading) => Ok(Some(reading)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All readings for a user, newest first
    pub fn list_for_user(conn: &Connection, user_id: &str) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT * FROM blood_sugar_readings WHERE user_id = ?1 ORDER BY timestamp DESC",
        )?;
        let readings = stmt
            .query_map([user_id], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Readings for a user with `start <= timestamp <= end`, newest first
    pub fn list_for_user_in_range(
        conn: &Connection,
        user_id: &str,
        start: i64,
        end: i64,
    ) -> DbResult<Vec<Self>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT * FROM blood_sugar_readings
            WHERE user_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
            ORDER BY timestamp DESC
            "#,
        )?;
        let readings = stmt
            .query_map(params![user_id, start, end], Self::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(readings)
    }

    /// Overwrite every mutable column of an existing row
    pub fn replace(conn: &Connection, reading: &Reading) -> DbResult<bool> {
        let rows = conn.execute(
            r#"
            UPDATE blood_sugar_readings
            SET glucose_level = ?1, timestamp = ?2, notes = ?3, meal_context = ?4,
                updated_at = datetime('now')
            WHERE id = ?5
            "#,
            params![
                reading.glucose_level,
                reading.timestamp,
                reading.notes,
                reading.meal_context.as_str(),
                reading.id,
            ],
        )?;
        Ok(rows > 0)
    }

    /// Delete a reading
    pub fn delete(conn: &Connection, id: &str) -> DbResult<bool> {
        let rows = conn.execute("DELETE FROM blood_sugar_readings WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Format the glucose value for display
    pub fn format_value(&self) -> String {
        format!("{} mg/dL", self.glucose_level.round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_boundaries_are_normal() {
        assert_eq!(GlucoseRange::classify(69.9), GlucoseRange::Low);
        assert_eq!(GlucoseRange::classify(70.0), GlucoseRange::Normal);
        assert_eq!(GlucoseRange::classify(180.0), GlucoseRange::Normal);
        assert_eq!(GlucoseRange::classify(180.1), GlucoseRange::High);
    }

    #[test]
    fn test_meal_context_parsing() {
        assert_eq!(MealContext::from_str("AFTER_MEAL"), Some(MealContext::AfterMeal));
        assert_eq!(MealContext::from_str("before-meal"), Some(MealContext::BeforeMeal));
        assert_eq!(MealContext::from_str("lunch"), None);
        assert_eq!(MealContext::from_str_or_default("garbage"), MealContext::BeforeMeal);
    }

    #[test]
    fn test_meal_context_serializes_as_upper_snake() {
        let json = serde_json::to_string(&MealContext::AfterMeal).unwrap();
        assert_eq!(json, "\"AFTER_MEAL\"");
    }

    #[test]
    fn test_reading_defaults_meal_context_when_missing() {
        let json = r#"{"id":null,"user_id":"u1","glucose_level":101.0,"timestamp":5,"notes":null}"#;
        let reading: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(reading.meal_context, MealContext::BeforeMeal);
    }

    #[test]
    fn test_validate_glucose_level() {
        assert!(validate_glucose_level(95.0).is_ok());
        assert!(validate_glucose_level(0.0).is_err());
        assert!(validate_glucose_level(-4.0).is_err());
        assert!(validate_glucose_level(1000.0).is_err());
        assert!(validate_glucose_level(f64::NAN).is_err());
    }

    #[test]
    fn test_with_update_blank_notes_clear() {
        let reading = Reading {
            id: Some("r1".into()),
            user_id: "u1".into(),
            glucose_level: 110.0,
            timestamp: 1_000,
            notes: Some("after run".into()),
            meal_context: MealContext::AfterMeal,
        };
        let updated = reading.with_update(&ReadingUpdate {
            glucose_level: Some(120.0),
            notes: Some("   ".into()),
            ..Default::default()
        });
        assert_eq!(updated.glucose_level, 120.0);
        assert_eq!(updated.notes, None);
        assert_eq!(updated.meal_context, MealContext::AfterMeal);
        assert_eq!(updated.timestamp, 1_000);
    }

    #[test]
    fn test_round_trip_through_sqlite() {
        let db = crate::db::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let reading = Reading {
                id: Some("r1".into()),
                user_id: "u1".into(),
                glucose_level: 142.5,
                timestamp: 1_700_000_000_000,
                notes: None,
                meal_context: MealContext::AfterMeal,
            };
            Reading::insert(conn, &reading)?;
            let loaded = Reading::get_by_id(conn, "r1")?;
            assert_eq!(loaded, Some(reading));
            assert!(Reading::get_by_id(conn, "missing")?.is_none());
            Ok(())
        })
        .unwrap();
    }
}
