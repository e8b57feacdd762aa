//! Runtime configuration
//!
//! Read once from the environment at startup.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::analytics::Calendar;
use crate::cache::{KeyValueStore, MemoryStore, SqliteStore};
use crate::db::{self, DbError};
use crate::repository::{
    MemoryReadingRepository, ReadingRepository, Session, SqliteReadingRepository,
};

pub const ENV_BACKEND: &str = "SWEETSYNC_BACKEND";
pub const ENV_DATABASE_PATH: &str = "SWEETSYNC_DATABASE_PATH";
pub const ENV_USER_ID: &str = "SWEETSYNC_USER_ID";
pub const ENV_UTC_OFFSET_MINUTES: &str = "SWEETSYNC_UTC_OFFSET_MINUTES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown backend '{0}' (expected 'sqlite' or 'memory')")]
    UnknownBackend(String),

    #[error("Invalid UTC offset '{0}': expected whole minutes between -1439 and 1439")]
    InvalidOffset(String),

    #[error("Failed to prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Storage backend for readings and the snapshot cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Memory,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sqlite => "sqlite",
            Backend::Memory => "memory",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" | "sql" | "local" => Some(Backend::Sqlite),
            "memory" | "mem" | "in-memory" | "in_memory" => Some(Backend::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub database_path: PathBuf,
    /// User signed in at startup, if any
    pub user_id: Option<String>,
    pub calendar: Calendar,
}

/// Storage pieces produced from a [`Config`]
pub struct Storage {
    pub repository: Arc<dyn ReadingRepository>,
    pub cache_store: Arc<dyn KeyValueStore>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable lookup (the environment, or a map in tests)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = match lookup(ENV_BACKEND) {
            Some(raw) => Backend::from_str(&raw).ok_or(ConfigError::UnknownBackend(raw))?,
            None => Backend::Sqlite,
        };

        let database_path = lookup(ENV_DATABASE_PATH)
            .map(PathBuf::from)
            .unwrap_or_else(default_database_path);

        let user_id = lookup(ENV_USER_ID).filter(|id| !id.trim().is_empty());

        let calendar = match lookup(ENV_UTC_OFFSET_MINUTES) {
            Some(raw) => raw
                .trim()
                .parse::<i32>()
                .ok()
                .filter(|m| m.abs() < 24 * 60)
                .and_then(Calendar::from_offset_minutes)
                .ok_or(ConfigError::InvalidOffset(raw))?,
            None => Calendar::local(),
        };

        Ok(Self {
            backend,
            database_path,
            user_id,
            calendar,
        })
    }

    /// Session pre-populated with the configured user
    pub fn session(&self) -> Session {
        match &self.user_id {
            Some(id) => Session::signed_in(id.clone()),
            None => Session::new(),
        }
    }

    /// Open the configured backend. SQLite databases are created and migrated
    /// as needed.
    pub fn open_storage(&self, session: Session) -> Result<Storage, ConfigError> {
        match self.backend {
            Backend::Sqlite => {
                if let Some(parent) = self.database_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let database = db::open_migrated(&self.database_path)?;
                tracing::info!("Opened SQLite store at {}", self.database_path.display());
                Ok(Storage {
                    repository: Arc::new(SqliteReadingRepository::new(database.clone(), session)),
                    cache_store: Arc::new(SqliteStore::new(database)),
                })
            }
            Backend::Memory => {
                tracing::info!("Using in-memory store; readings are not persisted");
                Ok(Storage {
                    repository: Arc::new(MemoryReadingRepository::new(session)),
                    cache_store: Arc::new(MemoryStore::new()),
                })
            }
        }
    }
}

/// `<project>/data/sweetsync.db`, resolved from the executable location
pub fn default_database_path() -> PathBuf {
    let mut path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."));

    // Go up from target/release or target/debug to project root
    if path.ends_with("release") || path.ends_with("debug") {
        if let Some(grandparent) = path.parent().and_then(|p| p.parent()) {
            path = grandparent.to_path_buf();
        }
    }

    path.push("data");
    path.push("sweetsync.db");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.backend, Backend::Sqlite);
        assert!(config.database_path.ends_with("data/sweetsync.db"));
        assert!(config.user_id.is_none());
        assert!(!config.session().is_signed_in());
    }

    #[test]
    fn test_explicit_values() {
        let config = Config::from_lookup(lookup(&[
            (ENV_BACKEND, "memory"),
            (ENV_DATABASE_PATH, "/tmp/readings.db"),
            (ENV_USER_ID, "alice"),
            (ENV_UTC_OFFSET_MINUTES, "-300"),
        ]))
        .unwrap();
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.database_path, PathBuf::from("/tmp/readings.db"));
        assert_eq!(config.session().current_user_id().as_deref(), Some("alice"));
        assert_eq!(config.calendar.offset().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[(ENV_BACKEND, "firebase")])),
            Err(ConfigError::UnknownBackend(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(ENV_UTC_OFFSET_MINUTES, "1440")])),
            Err(ConfigError::InvalidOffset(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[(ENV_UTC_OFFSET_MINUTES, "east")])),
            Err(ConfigError::InvalidOffset(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_backend_opens() {
        let config =
            Config::from_lookup(lookup(&[(ENV_BACKEND, "memory"), (ENV_USER_ID, "bob")])).unwrap();
        let storage = config.open_storage(config.session()).unwrap();
        assert_eq!(storage.repository.backend_name(), "memory");
        assert!(storage.repository.list().await.unwrap().is_empty());
    }
}
