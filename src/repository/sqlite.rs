//! SQLite-backed repository

use std::sync::Arc;

use async_trait::async_trait;

use super::feed::{ChangeNotifier, ReadingFeed};
use super::{
    check_glucose, check_owner, new_reading_id, ReadingRepository, RepoError, RepoResult, Session,
};
use crate::db::Database;
use crate::models::{Reading, ReadingCreate};

#[derive(Clone)]
pub struct SqliteReadingRepository {
    database: Database,
    session: Session,
    changes: ChangeNotifier,
}

impl SqliteReadingRepository {
    /// `database` must already be migrated
    pub fn new(database: Database, session: Session) -> Self {
        Self {
            database,
            session,
            changes: ChangeNotifier::default(),
        }
    }

    /// Run blocking SQLite work off the async executor
    async fn blocking<T, F>(&self, f: F) -> RepoResult<T>
    where
        F: FnOnce(&Database) -> RepoResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let database = self.database.clone();
        tokio::task::spawn_blocking(move || f(&database))
            .await
            .map_err(|e| RepoError::Backend(format!("SQLite task failed: {}", e)))?
    }
}

#[async_trait]
impl ReadingRepository for SqliteReadingRepository {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, data: ReadingCreate) -> RepoResult<Reading> {
        let user_id = self.session.require_user()?;
        check_glucose(data.glucose_level)?;

        let reading = Reading::from_create(new_reading_id(), &user_id, data);
        let stored = reading.clone();
        self.blocking(move |db| {
            db.with_conn(|conn| Reading::insert(conn, &stored))?;
            Ok(())
        })
        .await?;

        tracing::info!(user_id = %user_id, "Inserted reading {:?}", reading.id);
        self.changes.notify();
        Ok(reading)
    }

    async fn list(&self) -> RepoResult<Vec<Reading>> {
        let user_id = self.session.require_user()?;
        self.blocking(move |db| Ok(db.with_conn(|conn| Reading::list_for_user(conn, &user_id))?))
            .await
    }

    fn list_live(&self) -> ReadingFeed {
        let Some(user_id) = self.session.current_user_id() else {
            return ReadingFeed::signed_out();
        };

        let database = self.database.clone();
        let owner = user_id.clone();
        ReadingFeed::new(
            self.changes.subscribe(),
            Arc::new(move || {
                Ok(database.with_conn(|conn| Reading::list_for_user(conn, &user_id))?)
            }),
        )
        .for_user(self.session.clone(), owner)
    }

    async fn get(&self, id: &str) -> RepoResult<Reading> {
        let user_id = self.session.require_user()?;
        let id = id.to_string();
        self.blocking(move |db| {
            let existing = db.with_conn(|conn| Reading::get_by_id(conn, &id))?;
            check_owner(existing.as_ref(), &id, &user_id)?;
            existing.ok_or(RepoError::NotFound(id))
        })
        .await
    }

    async fn update(&self, reading: &Reading) -> RepoResult<Reading> {
        let user_id = self.session.require_user()?;
        let id = reading.id.clone().ok_or(RepoError::MissingId)?;
        check_glucose(reading.glucose_level)?;

        let mut updated = reading.clone();
        updated.user_id = user_id.clone();
        let stored = updated.clone();
        self.blocking(move |db| {
            db.with_transaction(|tx| {
                let existing = Reading::get_by_id(tx, &id)?;
                check_owner(existing.as_ref(), &id, &user_id)?;
                Reading::replace(tx, &stored)?;
                Ok(())
            })
        })
        .await?;

        self.changes.notify();
        Ok(updated)
    }

    async fn delete(&self, id: &str) -> RepoResult<()> {
        let user_id = self.session.require_user()?;
        let id = id.to_string();
        self.blocking(move |db| {
            db.with_transaction(|tx| {
                let existing = Reading::get_by_id(tx, &id)?;
                check_owner(existing.as_ref(), &id, &user_id)?;
                Reading::delete(tx, &id)?;
                Ok(())
            })
        })
        .await?;

        self.changes.notify();
        Ok(())
    }

    async fn list_by_date_range(&self, start: i64, end: i64) -> RepoResult<Vec<Reading>> {
        let user_id = self.session.require_user()?;
        self.blocking(move |db| {
            Ok(db.with_conn(|conn| Reading::list_for_user_in_range(conn, &user_id, start, end))?)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::contract;

    fn repo() -> (SqliteReadingRepository, Session) {
        let session = Session::new();
        let database = crate::db::open_in_memory().unwrap();
        (SqliteReadingRepository::new(database, session.clone()), session)
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let (repo, session) = repo();
        contract::insert_and_list(&repo, &session).await;
    }

    #[tokio::test]
    async fn test_requires_session() {
        let (repo, session) = repo();
        contract::requires_session(&repo, &session).await;
    }

    #[tokio::test]
    async fn test_rejects_invalid_glucose() {
        let (repo, session) = repo();
        contract::rejects_invalid_glucose(&repo, &session).await;
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (repo, session) = repo();
        contract::users_are_isolated(&repo, &session).await;
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let (repo, session) = repo();
        contract::update_and_delete(&repo, &session).await;
    }

    #[tokio::test]
    async fn test_date_range_is_inclusive() {
        let (repo, session) = repo();
        contract::date_range_is_inclusive(&repo, &session).await;
    }

    #[tokio::test]
    async fn test_live_feed_follows_changes() {
        let (repo, session) = repo();
        contract::live_feed_follows_changes(&repo, &session).await;
    }

    #[tokio::test]
    async fn test_live_feed_closes_after_user_change() {
        let (repo, session) = repo();
        contract::live_feed_closes_after_user_change(&repo, &session).await;
    }
}
