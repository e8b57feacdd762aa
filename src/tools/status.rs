//! SweetSync Status Tool
//!
//! Runtime status of the service and the usage guide handed to assistants.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use sysinfo::{Pid, ProcessesToUpdate, System};

use crate::build_info::BuildInfo;
use crate::models::{HIGH_THRESHOLD, LOW_THRESHOLD, MAX_GLUCOSE_LEVEL};
use crate::repository::ReadingRepository;

/// Reading and chart instructions for AI assistants
pub const READING_INSTRUCTIONS: &str = r#"
# SweetSync Reading Instructions

SweetSync keeps a per-user log of blood sugar readings and turns it into
charts and summary statistics.

## Signing In

Every reading belongs to a user. Call `sign_in` with a `user_id` before
anything else (the server may already be signed in from its environment;
check with `sweetsync_status`). `sign_out` forgets the user and clears the
cached reading list and display name.

---

## Recording a Reading

**Tool:** `add_reading`
- `glucose_level` in mg/dL, greater than 0 and below 1000
- `meal_context`: `before_meal` (default) or `after_meal`
- `notes`: optional; blank notes are dropped
- `timestamp`: optional epoch milliseconds, defaults to now

---

## Ranges

| Range | mg/dL |
|-------|-------|
| **Low** | below 70 |
| **Normal** | 70 to 180, both inclusive |
| **High** | above 180 |

---

## Periods

| Period | Meaning | Chart |
|--------|---------|-------|
| `week` | The 7 most recent readings, however old | Bar, one bar per reading |
| `month` | Readings from the last 30 days | Line, 30 daily averages ending on the newest reading's day; days without readings are null |
| `year` | Readings from the last 365 days | Line, one point per reading, oldest first |

`week` counts records, not days. Seven readings taken months ago still fill
the week chart.

---

## Reports

- `get_chart` - chart series for a period
- `get_statistics` - average, max, min (with dates), counts per range,
  percentage in range and days since the last reading
- `get_period_report` - both of the above plus a warning when the newest
  reading in the `year` view is more than 7 days old
- `get_dashboard` - every period at once, plus the latest reading

If the store cannot be reached, listings fall back to the last list that
loaded successfully and say so with `from_cache: true`.

---

## Notes

- Dates for `list_readings_by_date_range` use YYYY-MM-DD and cover whole
  local days
- Readings can only be changed or deleted by the user who owns them
"#;

/// Stored readings of the signed-in user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadingTotals {
    pub count: usize,
    /// 0.0 when there are no readings
    pub average_glucose: f64,
}

/// Totals straight from the store, `None` when it cannot answer (signed out,
/// unreachable)
pub async fn reading_totals(repository: &dyn ReadingRepository) -> Option<ReadingTotals> {
    let totals = async {
        Ok::<_, crate::repository::RepoError>(ReadingTotals {
            count: repository.reading_count().await?,
            average_glucose: repository.average_glucose().await?,
        })
    };
    match totals.await {
        Ok(totals) => Some(totals),
        Err(e) => {
            tracing::debug!("No reading totals for status: {}", e);
            None
        }
    }
}

/// Runtime status of the SweetSync service
#[derive(Debug, Clone, Serialize)]
pub struct SweetSyncStatus {
    /// Build information
    pub build_number: u64,
    pub build_timestamp: &'static str,
    pub version: &'static str,

    /// Storage information
    pub backend: String,
    pub database_path: Option<String>,
    pub database_size_bytes: Option<u64>,

    /// Session
    pub signed_in_user: Option<String>,
    pub readings: Option<ReadingTotals>,

    /// Classification thresholds in mg/dL
    pub low_threshold: f64,
    pub high_threshold: f64,
    pub max_glucose_level: f64,

    /// Process information
    pub uptime_seconds: u64,
    pub process_id: u32,
    pub memory_usage_bytes: u64,
}

/// Status tracker for collecting runtime information
pub struct StatusTracker {
    start_time: Instant,
    backend: String,
    database_path: Option<PathBuf>,
}

impl StatusTracker {
    /// `database_path` is `None` for backends without a file
    pub fn new(backend: impl Into<String>, database_path: Option<PathBuf>) -> Self {
        Self {
            start_time: Instant::now(),
            backend: backend.into(),
            database_path,
        }
    }

    pub fn get_status(
        &self,
        signed_in_user: Option<String>,
        readings: Option<ReadingTotals>,
    ) -> SweetSyncStatus {
        let build_info = BuildInfo::current();

        let database_size_bytes = self
            .database_path
            .as_ref()
            .and_then(|path| std::fs::metadata(path).ok())
            .map(|m| m.len());

        let pid = std::process::id();
        let mut sys = System::new();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]));

        let memory_usage_bytes = sys
            .process(Pid::from_u32(pid))
            .map(|p| p.memory())
            .unwrap_or(0);

        SweetSyncStatus {
            build_number: build_info.build_number,
            build_timestamp: build_info.build_timestamp,
            version: build_info.version,
            backend: self.backend.clone(),
            database_path: self.database_path.as_ref().map(|p| p.display().to_string()),
            database_size_bytes,
            signed_in_user,
            readings,
            low_threshold: LOW_THRESHOLD,
            high_threshold: HIGH_THRESHOLD,
            max_glucose_level: MAX_GLUCOSE_LEVEL,
            uptime_seconds: self.start_time.elapsed().as_secs(),
            process_id: pid,
            memory_usage_bytes,
        }
    }
}
