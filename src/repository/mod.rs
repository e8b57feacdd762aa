//! Reading repositories
//!
//! One capability interface over interchangeable storage backends. Every
//! operation acts for the user signed in to the shared [`Session`].

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DbError;
use crate::models::{validate_glucose_level, Reading, ReadingCreate};

mod feed;
mod memory;
mod session;
mod sqlite;

pub use feed::{ChangeNotifier, ReadingFeed, SnapshotFn};
pub use memory::MemoryReadingRepository;
pub use session::Session;
pub use sqlite::SqliteReadingRepository;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("User not logged in")]
    NotLoggedIn,

    #[error("Reading ID is required for update")]
    MissingId,

    #[error("Reading not found with id: {0}")]
    NotFound(String),

    #[error("Unauthorized: cannot modify another user's reading")]
    Unauthorized,

    #[error("Invalid reading: {0}")]
    InvalidReading(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait ReadingRepository: Send + Sync {
    /// Short backend identifier ("sqlite", "memory")
    fn backend_name(&self) -> &'static str;

    /// Store a new reading owned by the signed-in user
    async fn insert(&self, data: ReadingCreate) -> RepoResult<Reading>;

    /// All of the user's readings, newest first
    async fn list(&self) -> RepoResult<Vec<Reading>>;

    /// Snapshot now, then again after every change
    fn list_live(&self) -> ReadingFeed;

    /// One of the user's readings
    async fn get(&self, id: &str) -> RepoResult<Reading>;

    /// Replace a reading the user owns; `reading.id` is required
    async fn update(&self, reading: &Reading) -> RepoResult<Reading>;

    async fn delete(&self, id: &str) -> RepoResult<()>;

    /// Readings with `start <= timestamp <= end` (epoch ms), newest first
    async fn list_by_date_range(&self, start: i64, end: i64) -> RepoResult<Vec<Reading>>;

    /// Mean glucose over all of the user's readings, 0.0 when there are none
    async fn average_glucose(&self) -> RepoResult<f64> {
        let readings = self.list().await?;
        if readings.is_empty() {
            return Ok(0.0);
        }
        Ok(readings.iter().map(|r| r.glucose_level).sum::<f64>() / readings.len() as f64)
    }

    async fn reading_count(&self) -> RepoResult<usize> {
        Ok(self.list().await?.len())
    }
}

/// Reject glucose values outside the accepted entry range
pub(crate) fn check_glucose(glucose_level: f64) -> RepoResult<()> {
    validate_glucose_level(glucose_level).map_err(RepoError::InvalidReading)
}

/// Ownership rule shared by the backends for update and delete
pub(crate) fn check_owner(existing: Option<&Reading>, id: &str, user_id: &str) -> RepoResult<()> {
    match existing {
        None => Err(RepoError::NotFound(id.to_string())),
        Some(reading) if reading.user_id != user_id => Err(RepoError::Unauthorized),
        Some(_) => Ok(()),
    }
}

pub(crate) fn new_reading_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
