//! Database module
//!
//! Handles SQLite connection and migrations.

pub mod connection;
pub mod migrations;

use rusqlite::Connection;

pub use connection::{Database, DbError, DbResult};

/// Open a pooled database and bring its schema up to date
pub fn open_migrated<P: AsRef<std::path::Path>>(path: P) -> DbResult<Database> {
    let database = Database::new(path)?;
    database.with_conn(migrate)?;
    Ok(database)
}

/// In-memory database with the current schema applied
pub fn open_in_memory() -> DbResult<Database> {
    let database = Database::in_memory()?;
    database.with_conn(migrate)?;
    Ok(database)
}

/// Run pending migrations; returns whether any were needed
fn migrate(conn: &Connection) -> DbResult<bool> {
    if !migrations::needs_migration(conn)? {
        tracing::debug!("Schema is up to date");
        return Ok(false);
    }
    migrations::run_migrations(conn)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_skips_current_schema() {
        let database = open_in_memory().unwrap();
        assert!(!database.with_conn(migrate).unwrap());
        assert!(!database.with_conn(migrations::needs_migration).unwrap());
    }

    #[test]
    fn test_fresh_database_is_migrated_once() {
        let database = Database::in_memory().unwrap();
        assert!(database.with_conn(migrate).unwrap());
        assert!(!database.with_conn(migrate).unwrap());
    }
}
