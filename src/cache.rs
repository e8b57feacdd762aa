//! Last-known-good snapshots
//!
//! A [`SnapshotCache`] keeps the most recent successful value of something
//! (the reading list, the user's display name) in a key-value store so it can
//! be shown when a fresh load fails. Cache failures are logged and otherwise
//! ignored; they never interrupt the caller.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use rusqlite::{params, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::db::{Database, DbError};

pub const READINGS_CACHE_KEY: &str = "cached_readings";
pub const USER_NAME_CACHE_KEY: &str = "cached_username";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// String key-value storage a cache can sit on
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> CacheResult<Option<String>>;
    fn put(&self, key: &str, value: &str) -> CacheResult<()>;
    fn remove(&self, key: &str) -> CacheResult<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

/// Store backed by the `kv_cache` table
#[derive(Clone)]
pub struct SqliteStore {
    database: Database,
}

impl SqliteStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let value = self.database.with_conn(|conn| {
            Ok(conn
                .query_row("SELECT value FROM kv_cache WHERE key = ?1", [key], |row| row.get(0))
                .optional()?)
        })?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> CacheResult<()> {
        self.database.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO kv_cache (key, value) VALUES (?1, ?2)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = datetime('now')
                "#,
                params![key, value],
            )?;
            Ok(())
        })?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        self.database.with_conn(|conn| {
            conn.execute("DELETE FROM kv_cache WHERE key = ?1", [key])?;
            Ok(())
        })?;
        Ok(())
    }
}

/// Typed snapshot stored as JSON under one key
pub struct SnapshotCache<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for SnapshotCache<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> SnapshotCache<T> {
    pub fn new(store: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace the snapshot
    pub fn save(&self, value: &T) {
        if let Err(e) = self.try_save(value) {
            tracing::warn!("Cache save failed for '{}': {}", self.key, e);
        }
    }

    /// Last saved snapshot, `None` when absent or unreadable
    pub fn load(&self) -> Option<T> {
        match self.try_load() {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cache load failed for '{}': {}", self.key, e);
                None
            }
        }
    }

    pub fn invalidate(&self) {
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!("Cache clear failed for '{}': {}", self.key, e);
        }
    }

    fn try_save(&self, value: &T) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        self.store.put(&self.key, &json)
    }

    fn try_load(&self) -> CacheResult<Option<T>> {
        match self.store.get(&self.key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
