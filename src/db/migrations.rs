//! Schema migrations
//!
//! Each entry in [`MIGRATIONS`] is applied once, in order, and recorded in
//! `schema_migrations`.

use rusqlite::Connection;

use super::connection::DbResult;

/// Readings and the key-value snapshot cache
const V1_READINGS_AND_CACHE: &str = r#"
    -- One glucose measurement per row, owned by a user
    CREATE TABLE blood_sugar_readings (
        id TEXT PRIMARY KEY,                 -- opaque (uuid v4)
        user_id TEXT NOT NULL,
        glucose_level REAL NOT NULL CHECK (glucose_level > 0 AND glucose_level < 1000),  -- mg/dL
        timestamp INTEGER NOT NULL,          -- epoch milliseconds
        notes TEXT,
        meal_context TEXT NOT NULL CHECK (meal_context IN ('BEFORE_MEAL', 'AFTER_MEAL')),

        created_at TEXT NOT NULL DEFAULT (datetime('now')),
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE INDEX idx_blood_sugar_readings_user_id ON blood_sugar_readings(user_id);
    CREATE INDEX idx_blood_sugar_readings_user_timestamp ON blood_sugar_readings(user_id, timestamp DESC);

    -- Last-known-good snapshots (JSON payloads)
    CREATE TABLE kv_cache (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL DEFAULT (datetime('now'))
    );
"#;

/// (version, SQL) in ascending version order
const MIGRATIONS: &[(i32, &str)] = &[(1, V1_READINGS_AND_CACHE)];

const SCHEMA_VERSION: i32 = 1;

/// Bring the schema up to [`SCHEMA_VERSION`]
pub fn run_migrations(conn: &Connection) -> DbResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current = get_schema_version(conn)?;
    for (version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])?;
        tracing::info!("Applied schema migration v{}", version);
    }

    Ok(())
}

/// Get the current schema version
pub fn get_schema_version(conn: &Connection) -> DbResult<i32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    );
    match version {
        Ok(v) => Ok(v),
        // Table not created yet
        Err(rusqlite::Error::SqliteFailure(_, _)) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Check if the database needs migration
pub fn needs_migration(conn: &Connection) -> DbResult<bool> {
    let current = get_schema_version(conn)?;
    Ok(current < SCHEMA_VERSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_migrations_are_idempotent() {
        assert_eq!(MIGRATIONS.last().map(|(v, _)| *v), Some(SCHEMA_VERSION));

        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            assert!(needs_migration(conn)?);
            run_migrations(conn)?;
            run_migrations(conn)?;
            assert_eq!(get_schema_version(conn)?, SCHEMA_VERSION);
            assert!(!needs_migration(conn)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_glucose_check_constraint() {
        let db = Database::in_memory().unwrap();
        db.with_conn(|conn| {
            run_migrations(conn)?;
            let rejected = conn.execute(
                "INSERT INTO blood_sugar_readings (id, user_id, glucose_level, timestamp, meal_context)
                 VALUES ('a', 'u', 0, 0, 'BEFORE_MEAL')",
                [],
            );
            assert!(rejected.is_err());
            Ok(())
        })
        .unwrap();
    }
}
