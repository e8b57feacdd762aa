//! In-memory repository

use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use super::feed::{ChangeNotifier, ReadingFeed};
use super::{
    check_glucose, check_owner, new_reading_id, ReadingRepository, RepoError, RepoResult, Session,
};
use crate::models::{Reading, ReadingCreate};

/// Volatile backend; contents last as long as the process
#[derive(Clone, Default)]
pub struct MemoryReadingRepository {
    readings: Arc<RwLock<Vec<Reading>>>,
    session: Session,
    changes: ChangeNotifier,
}

impl MemoryReadingRepository {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            ..Default::default()
        }
    }

    fn snapshot_for(readings: &RwLock<Vec<Reading>>, user_id: &str) -> Vec<Reading> {
        let guard = readings.read().unwrap_or_else(|e| e.into_inner());
        let mut mine: Vec<Reading> = guard
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        mine
    }

    fn find(&self, id: &str) -> Option<Reading> {
        let guard = self.readings.read().unwrap_or_else(|e| e.into_inner());
        guard.iter().find(|r| r.id.as_deref() == Some(id)).cloned()
    }
}

#[async_trait]
impl ReadingRepository for MemoryReadingRepository {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, data: ReadingCreate) -> RepoResult<Reading> {
        let user_id = self.session.require_user()?;
        check_glucose(data.glucose_level)?;

        let reading = Reading::from_create(new_reading_id(), &user_id, data);
        self.readings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(reading.clone());

        self.changes.notify();
        Ok(reading)
    }

    async fn list(&self) -> RepoResult<Vec<Reading>> {
        let user_id = self.session.require_user()?;
        Ok(Self::snapshot_for(&self.readings, &user_id))
    }

    fn list_live(&self) -> ReadingFeed {
        let Some(user_id) = self.session.current_user_id() else {
            return ReadingFeed::signed_out();
        };

        let readings = Arc::clone(&self.readings);
        let owner = user_id.clone();
        ReadingFeed::new(
            self.changes.subscribe(),
            Arc::new(move || Ok(Self::snapshot_for(&readings, &user_id))),
        )
        .for_user(self.session.clone(), owner)
    }

    async fn get(&self, id: &str) -> RepoResult<Reading> {
        let user_id = self.session.require_user()?;
        let existing = self.find(id);
        check_owner(existing.as_ref(), id, &user_id)?;
        existing.ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    async fn update(&self, reading: &Reading) -> RepoResult<Reading> {
        let user_id = self.session.require_user()?;
        let id = reading.id.as_deref().ok_or(RepoError::MissingId)?;
        check_glucose(reading.glucose_level)?;

        let mut updated = reading.clone();
        updated.user_id = user_id.clone();
        {
            let mut guard = self.readings.write().unwrap_or_else(|e| e.into_inner());
            let slot = guard.iter_mut().find(|r| r.id.as_deref() == Some(id));
            check_owner(slot.as_deref(), id, &user_id)?;
            if let Some(slot) = slot {
                *slot = updated.clone();
            }
        }

        self.changes.notify();
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let user_id = self.session.require_user()?;
        {
            let mut guard = self.readings.write().unwrap_or_else(|e| e.into_inner());
            let position = guard.iter().position(|r| r.id.as_deref() == Some(id));
            check_owner(position.map(|i| &guard[i]), id, &user_id)?;
            if let Some(i) = position {
                guard.remove(i);
            }
        }

        self.changes.notify();
        Ok(())
    }

    async fn list_by_date_range(&self, start: i64, end: i64) -> RepoResult<Vec<Reading>> {
        let user_id = self.session.require_user()?;
        Ok(Self::snapshot_for(&self.readings, &user_id)
            .into_iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .collect())
    }
}
