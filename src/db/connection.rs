//! Database connection management
//!
//! Pooled SQLite connections shared by the reading store and the snapshot
//! cache.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags, Transaction};
use thiserror::Error;

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const FILE_POOL_SIZE: u32 = 8;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database connection error: {0}")]
    Connection(#[from] r2d2::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

pub type DbResult<T> = Result<T, DbError>;

pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Cloneable handle to a connection pool
#[derive(Clone)]
pub struct Database {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl Database {
    /// Open (or create) a database file
    pub fn new<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)
            .with_init(|conn| {
                conn.busy_timeout(BUSY_TIMEOUT)?;
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;",
                )
            });

        Self::from_builder(Pool::builder().max_size(FILE_POOL_SIZE), manager)
    }

    /// Private in-memory database.
    ///
    /// Every SQLite `:memory:` connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub fn in_memory() -> DbResult<Self> {
        let builder = Pool::builder()
            .max_size(1)
            .max_lifetime(None)
            .idle_timeout(None);

        Self::from_builder(builder, SqliteConnectionManager::memory())
    }

    fn from_builder(
        builder: r2d2::Builder<SqliteConnectionManager>,
        manager: SqliteConnectionManager,
    ) -> DbResult<Self> {
        Ok(Self {
            pool: Arc::new(builder.build(manager)?),
        })
    }

    pub fn get_conn(&self) -> DbResult<PooledConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` on a pooled connection
    pub fn with_conn<F, T>(&self, f: F) -> DbResult<T>
    where
        F: FnOnce(&Connection) -> DbResult<T>,
    {
        let conn = self.get_conn()?;
        f(&conn)
    }

    /// Run `f` inside a transaction; commits when `f` returns `Ok`.
    ///
    /// The error type is the caller's so checks that are not database errors
    /// can abort the transaction too.
    pub fn with_transaction<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<DbError>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(DbError::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(DbError::from)?;
        Ok(value)
    }
}
