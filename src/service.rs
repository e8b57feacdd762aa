//! Readings service
//!
//! Holds the current reading list for the signed-in user, keeps the
//! last-known-good snapshot cached, and serves per-period chart reports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::Serialize;

use crate::analytics::{ChartAggregator, PeriodReport};
use crate::cache::{KeyValueStore, SnapshotCache, READINGS_CACHE_KEY, USER_NAME_CACHE_KEY};
use crate::models::{
    normalize_notes, ChartPeriod, MealContext, Reading, ReadingCreate, ReadingUpdate,
};
use crate::repository::{ReadingRepository, RepoResult, Session};

/// What the home and chart views render from
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadingsState {
    pub readings: Vec<Reading>,
    pub error_message: Option<String>,
    /// The list came from the cache after a failed load
    pub from_cache: bool,
}

/// Report plus the inputs it was computed from
struct MemoEntry {
    readings: Vec<Reading>,
    today: NaiveDate,
    report: PeriodReport,
}

pub struct ReadingsService {
    repository: Arc<dyn ReadingRepository>,
    session: Session,
    aggregator: ChartAggregator,
    readings_cache: SnapshotCache<Vec<Reading>>,
    user_name_cache: SnapshotCache<String>,
    state: Mutex<ReadingsState>,
    reports: Mutex<HashMap<ChartPeriod, MemoEntry>>,
    /// Bumped whenever the shown data is cleared; fetches started under an
    /// older value are dropped
    generation: AtomicU64,
}

impl ReadingsService {
    pub fn new(
        repository: Arc<dyn ReadingRepository>,
        cache_store: Arc<dyn KeyValueStore>,
        session: Session,
        aggregator: ChartAggregator,
    ) -> Self {
        Self {
            repository,
            session,
            aggregator,
            readings_cache: SnapshotCache::new(Arc::clone(&cache_store), READINGS_CACHE_KEY),
            user_name_cache: SnapshotCache::new(cache_store, USER_NAME_CACHE_KEY),
            state: Mutex::new(ReadingsState::default()),
            reports: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn repository(&self) -> &Arc<dyn ReadingRepository> {
        &self.repository
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn aggregator(&self) -> &ChartAggregator {
        &self.aggregator
    }

    pub fn state(&self) -> ReadingsState {
        self.lock_state().clone()
    }

    pub fn readings(&self) -> Vec<Reading> {
        self.lock_state().readings.clone()
    }

    /// Fetch from the repository; on failure show the cached snapshot instead
    pub async fn load_readings(&self) -> ReadingsState {
        let generation = self.generation.load(Ordering::SeqCst);
        let result = self.repository.list().await;

        let mut state = self.lock_state();
        if self.is_stale(generation) {
            return state.clone();
        }
        match result {
            Ok(readings) => self.show_fetched(&mut state, readings),
            Err(e) => {
                tracing::warn!("Failed to load readings: {}", e);
                if let Some(cached) = self.readings_cache.load() {
                    state.readings = cached;
                    state.from_cache = true;
                }
                state.error_message = Some(e.to_string());
            }
        }
        state.clone()
    }

    /// Fetch fresh data; on failure keep what is shown and report the error
    pub async fn refresh_readings(&self) -> ReadingsState {
        let generation = self.generation.load(Ordering::SeqCst);
        let result = self.repository.list().await;

        let mut state = self.lock_state();
        if self.is_stale(generation) {
            return state.clone();
        }
        match result {
            Ok(readings) => self.show_fetched(&mut state, readings),
            Err(e) => {
                tracing::warn!("Failed to refresh readings: {}", e);
                state.error_message = Some(e.to_string());
            }
        }
        state.clone()
    }

    /// Record a reading (timestamp defaults to now) and reload the list
    pub async fn add_reading(
        &self,
        glucose_level: f64,
        notes: Option<String>,
        meal_context: MealContext,
        timestamp: Option<i64>,
    ) -> RepoResult<Reading> {
        let data = ReadingCreate {
            glucose_level,
            timestamp: timestamp.unwrap_or_else(|| self.aggregator.now_millis()),
            notes: normalize_notes(notes),
            meal_context,
        };

        let reading = self.record_failure(self.repository.insert(data).await)?;
        self.load_readings().await;
        Ok(reading)
    }

    /// Apply a partial update to one of the user's readings and reload
    pub async fn update_reading(&self, id: &str, update: &ReadingUpdate) -> RepoResult<Reading> {
        let existing = self.record_failure(self.repository.get(id).await)?;
        let updated = existing.with_update(update);
        let saved = self.record_failure(self.repository.update(&updated).await)?;
        self.load_readings().await;
        Ok(saved)
    }

    pub async fn delete_reading(&self, id: &str) -> RepoResult<()> {
        self.record_failure(self.repository.delete(id).await)?;
        self.load_readings().await;
        Ok(())
    }

    pub async fn sign_in(&self, user_id: &str, display_name: Option<&str>) -> ReadingsState {
        self.clear_data();
        self.session.sign_in(user_id);
        if let Some(name) = display_name {
            self.cache_user_name(name);
        }
        tracing::info!(user_id = %user_id, "Signed in");
        self.load_readings().await
    }

    /// Forget the principal and everything cached for it
    pub fn sign_out(&self) {
        self.session.sign_out();
        self.clear_data();
        tracing::info!("Signed out");
    }

    /// Drop cached snapshots and the in-memory list
    pub fn clear_data(&self) {
        // Under the state lock so an in-flight fetch cannot save after this
        let mut state = self.lock_state();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.readings_cache.invalidate();
        self.user_name_cache.invalidate();
        *state = ReadingsState::default();
        drop(state);
        self.lock_reports().clear();
    }

    pub fn cache_user_name(&self, name: &str) {
        self.user_name_cache.save(&name.to_string());
    }

    pub fn cached_user_name(&self) -> Option<String> {
        self.user_name_cache.load()
    }

    /// Report for the current list, recomputed only when the list, the
    /// period, or the local date changes
    pub fn period_report(&self, period: ChartPeriod) -> PeriodReport {
        let readings = self.readings();
        let today = self.aggregator.now().date();

        let mut reports = self.lock_reports();
        if let Some(entry) = reports.get(&period) {
            if entry.today == today && entry.readings == readings {
                return entry.report.clone();
            }
        }

        let report = self.aggregator.period_report(&readings, period);
        tracing::debug!(
            "Computed {} report over {} readings",
            period.as_str(),
            report.statistics.count
        );
        reports.insert(
            period,
            MemoEntry {
                readings,
                today,
                report: report.clone(),
            },
        );
        report
    }

    /// Reports for every period, in display order
    pub fn dashboard(&self) -> Vec<PeriodReport> {
        ChartPeriod::ALL
            .iter()
            .map(|period| self.period_report(*period))
            .collect()
    }

    /// The data was cleared while a fetch was in flight
    fn is_stale(&self, generation: u64) -> bool {
        let current = self.generation.load(Ordering::SeqCst);
        if current != generation {
            tracing::debug!("Dropping readings fetched before the data was cleared");
        }
        current != generation
    }

    fn show_fetched(&self, state: &mut ReadingsState, readings: Vec<Reading>) {
        self.readings_cache.save(&readings);
        *state = ReadingsState {
            readings,
            error_message: None,
            from_cache: false,
        };
    }

    fn record_failure<T>(&self, result: RepoResult<T>) -> RepoResult<T> {
        if let Err(e) = &result {
            self.lock_state().error_message = Some(e.to_string());
        }
        result
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ReadingsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_reports(&self) -> std::sync::MutexGuard<'_, HashMap<ChartPeriod, MemoEntry>> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::analytics::{Calendar, FixedClock};
    use crate::cache::MemoryStore;
    use crate::repository::{MemoryReadingRepository, ReadingFeed, RepoError};

    const NOW_MS: i64 = 1_710_504_000_000;
    const DAY_MS: i64 = 86_400_000;

    fn aggregator() -> ChartAggregator {
        ChartAggregator::new(Arc::new(FixedClock(NOW_MS)), Calendar::utc())
    }

    fn service_with(
        repository: Arc<dyn ReadingRepository>,
        session: Session,
    ) -> (ReadingsService, Arc<dyn KeyValueStore>) {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let service = ReadingsService::new(repository, Arc::clone(&store), session, aggregator());
        (service, store)
    }

    fn memory_service() -> ReadingsService {
        let session = Session::signed_in("alice");
        let repo = Arc::new(MemoryReadingRepository::new(session.clone()));
        service_with(repo, session).0
    }

    /// Repository whose reads fail until told otherwise
    struct FlakyRepository {
        inner: MemoryReadingRepository,
        failing: std::sync::atomic::AtomicBool,
    }

    impl FlakyRepository {
        fn check(&self) -> RepoResult<()> {
            if self.failing.load(std::sync::atomic::Ordering::SeqCst) {
                Err(RepoError::Backend("network unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ReadingRepository for FlakyRepository {
        fn backend_name(&self) -> &'static str {
            "flaky"
        }
        async fn insert(&self, data: ReadingCreate) -> RepoResult<Reading> {
            self.inner.insert(data).await
        }
        async fn list(&self) -> RepoResult<Vec<Reading>> {
            self.check()?;
            self.inner.list().await
        }
        fn list_live(&self) -> ReadingFeed {
            self.inner.list_live()
        }
        async fn get(&self, id: &str) -> RepoResult<Reading> {
            self.inner.get(id).await
        }
        async fn update(&self, reading: &Reading) -> RepoResult<Reading> {
            self.inner.update(reading).await
        }
        async fn delete(&self, id: &str) -> RepoResult<()> {
            self.inner.delete(id).await
        }
        async fn list_by_date_range(&self, start: i64, end: i64) -> RepoResult<Vec<Reading>> {
            self.inner.list_by_date_range(start, end).await
        }
    }

    /// Repository whose `list` holds its result until released
    struct GatedRepository {
        inner: MemoryReadingRepository,
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl ReadingRepository for GatedRepository {
        fn backend_name(&self) -> &'static str {
            "gated"
        }
        async fn insert(&self, data: ReadingCreate) -> RepoResult<Reading> {
            self.inner.insert(data).await
        }
        async fn list(&self) -> RepoResult<Vec<Reading>> {
            let result = self.inner.list().await;
            self.entered.notify_one();
            self.release.notified().await;
            result
        }
        fn list_live(&self) -> ReadingFeed {
            self.inner.list_live()
        }
        async fn get(&self, id: &str) -> RepoResult<Reading> {
            self.inner.get(id).await
        }
        async fn update(&self, reading: &Reading) -> RepoResult<Reading> {
            self.inner.update(reading).await
        }
        async fn delete(&self, id: &str) -> RepoResult<()> {
            self.inner.delete(id).await
        }
        async fn list_by_date_range(&self, start: i64, end: i64) -> RepoResult<Vec<Reading>> {
            self.inner.list_by_date_range(start, end).await
        }
    }

    #[tokio::test]
    async fn test_add_reading_defaults_and_reloads() {
        let service = memory_service();
        let reading = service
            .add_reading(123.0, Some("   ".into()), MealContext::AfterMeal, None)
            .await
            .unwrap();

        assert_eq!(reading.timestamp, NOW_MS);
        assert_eq!(reading.notes, None);
        assert_eq!(service.readings(), vec![reading]);
        assert!(service.state().error_message.is_none());
    }

    #[tokio::test]
    async fn test_add_invalid_reading_sets_error() {
        let service = memory_service();
        let result = service.add_reading(-5.0, None, MealContext::BeforeMeal, None).await;
        assert!(matches!(result, Err(RepoError::InvalidReading(_))));
        assert!(service.state().error_message.is_some());
        assert!(service.readings().is_empty());
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_to_cache() {
        let session = Session::signed_in("alice");
        let flaky = Arc::new(FlakyRepository {
            inner: MemoryReadingRepository::new(session.clone()),
            failing: std::sync::atomic::AtomicBool::new(false),
        });
        let (service, _store) = service_with(flaky.clone(), session);

        service.add_reading(140.0, None, MealContext::AfterMeal, None).await.unwrap();
        let cached = service.readings();

        flaky.failing.store(true, std::sync::atomic::Ordering::SeqCst);

        // A fresh service over the same cache sees the snapshot
        *service.lock_state() = ReadingsState::default();
        let state = service.load_readings().await;
        assert_eq!(state.readings, cached);
        assert!(state.from_cache);
        assert_eq!(state.error_message.as_deref(), Some("Backend error: network unreachable"));
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_current_list() {
        let session = Session::signed_in("alice");
        let flaky = Arc::new(FlakyRepository {
            inner: MemoryReadingRepository::new(session.clone()),
            failing: std::sync::atomic::AtomicBool::new(false),
        });
        let (service, store) = service_with(flaky.clone(), session);

        service.add_reading(99.0, None, MealContext::BeforeMeal, None).await.unwrap();
        store.remove(READINGS_CACHE_KEY).unwrap();
        flaky.failing.store(true, std::sync::atomic::Ordering::SeqCst);

        let state = service.refresh_readings().await;
        assert_eq!(state.readings.len(), 1);
        assert!(!state.from_cache);
        assert!(state.error_message.is_some());

        flaky.failing.store(false, std::sync::atomic::Ordering::SeqCst);
        let state = service.refresh_readings().await;
        assert!(state.error_message.is_none());
        assert!(store.get(READINGS_CACHE_KEY).unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sign_out_invalidates_cache() {
        let session = Session::signed_in("alice");
        let repo = Arc::new(MemoryReadingRepository::new(session.clone()));
        let (service, store) = service_with(repo, session);

        service.cache_user_name("Alice");
        service.add_reading(110.0, None, MealContext::BeforeMeal, None).await.unwrap();
        assert!(store.get(READINGS_CACHE_KEY).unwrap().is_some());

        service.sign_out();
        assert!(store.get(READINGS_CACHE_KEY).unwrap().is_none());
        assert!(service.cached_user_name().is_none());
        assert!(service.readings().is_empty());
        assert!(!service.session().is_signed_in());

        let state = service.load_readings().await;
        assert_eq!(state.error_message.as_deref(), Some("User not logged in"));
        assert!(state.readings.is_empty());
    }

    #[tokio::test]
    async fn test_sign_out_during_load_discards_fetched_readings() {
        let session = Session::signed_in("alice");
        let gated = Arc::new(GatedRepository {
            inner: MemoryReadingRepository::new(session.clone()),
            entered: tokio::sync::Notify::new(),
            release: tokio::sync::Notify::new(),
        });
        gated
            .inner
            .insert(ReadingCreate {
                glucose_level: 130.0,
                timestamp: NOW_MS,
                notes: None,
                meal_context: MealContext::AfterMeal,
            })
            .await
            .unwrap();

        let (service, store) = service_with(gated.clone(), session);
        let service = Arc::new(service);

        let loading = tokio::spawn({
            let service = Arc::clone(&service);
            async move { service.load_readings().await }
        });

        gated.entered.notified().await;
        service.sign_out();
        gated.release.notify_one();

        let state = loading.await.unwrap();
        assert!(state.readings.is_empty());
        assert!(service.readings().is_empty());
        assert!(store.get(READINGS_CACHE_KEY).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_in_switches_user() {
        let session = Session::signed_in("alice");
        let repo = Arc::new(MemoryReadingRepository::new(session.clone()));
        let (service, _store) = service_with(repo, session);
        service.add_reading(110.0, None, MealContext::BeforeMeal, None).await.unwrap();

        let state = service.sign_in("bob", Some("Bob")).await;
        assert!(state.readings.is_empty());
        assert_eq!(service.cached_user_name().as_deref(), Some("Bob"));
    }

    #[tokio::test]
    async fn test_update_and_delete_reload() {
        let service = memory_service();
        let reading = service
            .add_reading(150.0, None, MealContext::AfterMeal, Some(NOW_MS - DAY_MS))
            .await
            .unwrap();
        let id = reading.id.clone().unwrap();

        let updated = service
            .update_reading(&id, &ReadingUpdate {
                glucose_level: Some(101.0),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(updated.glucose_level, 101.0);
        assert_eq!(service.readings()[0].glucose_level, 101.0);

        service.delete_reading(&id).await.unwrap();
        assert!(service.readings().is_empty());
    }

    #[tokio::test]
    async fn test_period_report_is_memoized_until_readings_change() {
        let service = memory_service();
        service
            .add_reading(120.0, None, MealContext::BeforeMeal, Some(NOW_MS - DAY_MS))
            .await
            .unwrap();

        let first = service.period_report(ChartPeriod::Month);
        let second = service.period_report(ChartPeriod::Month);
        assert_eq!(first, second);
        assert_eq!(first.statistics.count, 1);

        service
            .add_reading(200.0, None, MealContext::AfterMeal, Some(NOW_MS))
            .await
            .unwrap();
        let third = service.period_report(ChartPeriod::Month);
        assert_eq!(third.statistics.count, 2);
        assert_eq!(third.statistics.high_count, 1);
    }

    #[tokio::test]
    async fn test_dashboard_covers_every_period() {
        let service = memory_service();
        let reports = service.dashboard();
        let periods: Vec<ChartPeriod> = reports.iter().map(|r| r.period).collect();
        assert_eq!(periods, ChartPeriod::ALL.to_vec());
        assert_eq!(reports[1].series.len(), 30);
        assert!(reports[0].series.is_empty());
    }
}
