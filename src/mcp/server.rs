//! SweetSync MCP Server Implementation
//!
//! Implements the MCP server with all SweetSync tools.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::service::ReadingsService;
use crate::tools::status::{self, StatusTracker};
use crate::tools::{account, charts, readings};

/// SweetSync MCP Service
#[derive(Clone)]
pub struct SweetSyncService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    readings: Arc<ReadingsService>,
    tool_router: ToolRouter<SweetSyncService>,
}

impl SweetSyncService {
    pub fn new(readings: Arc<ReadingsService>, database_path: Option<PathBuf>) -> Self {
        let backend = readings.repository().backend_name();
        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(backend, database_path))),
            readings,
            tool_router: Self::tool_router(),
        }
    }
}

/// Serialize a tool result, turning tool errors into MCP errors
fn respond<T: Serialize>(result: Result<T, String>) -> Result<CallToolResult, McpError> {
    let value = result.map_err(|e| McpError::internal_error(e, None))?;
    let json = serde_json::to_string_pretty(&value)
        .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// ============================================================================
// Account Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct SignInParams {
    /// User ID to act as
    pub user_id: String,
    /// Display name to remember for this user (optional)
    pub display_name: Option<String>,
}

// ============================================================================
// Reading Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct AddReadingParams {
    /// Glucose level in mg/dL (greater than 0, less than 1000)
    pub glucose_level: f64,
    /// before_meal (default) or after_meal
    pub meal_context: Option<String>,
    /// Optional notes
    pub notes: Option<String>,
    /// Epoch milliseconds (defaults to now)
    pub timestamp: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListReadingsParams {
    /// Maximum readings to return, newest first (default 50)
    #[serde(default = "default_list_limit")]
    pub limit: usize,
    /// Only readings from the last N days (optional)
    pub days: Option<u64>,
}

fn default_list_limit() -> usize {
    50
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListReadingsByDateRangeParams {
    /// First day (YYYY-MM-DD), inclusive
    pub start_date: String,
    /// Last day (YYYY-MM-DD), inclusive
    pub end_date: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct UpdateReadingParams {
    /// Reading ID
    pub id: String,
    /// New glucose level in mg/dL
    pub glucose_level: Option<f64>,
    /// New timestamp in epoch milliseconds
    pub timestamp: Option<i64>,
    /// New notes (empty string clears them)
    pub notes: Option<String>,
    /// before_meal or after_meal
    pub meal_context: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct DeleteReadingParams {
    /// Reading ID to delete
    pub id: String,
}

// ============================================================================
// Chart Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PeriodParams {
    /// week (last 7 records, default), month (last 30 days) or year (last 365 days)
    pub period: Option<String>,
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router]
impl SweetSyncService {
    // --- Status ---

    #[tool(description = "Get the current status of the SweetSync service including build info, storage backend, signed-in user, and process information")]
    async fn sweetsync_status(&self) -> Result<CallToolResult, McpError> {
        let totals = status::reading_totals(self.readings.repository().as_ref()).await;
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status(self.readings.session().current_user_id(), totals);
        respond(Ok(status))
    }

    #[tool(description = "Get instructions for recording readings and reading the charts. Call this when starting a session or when unsure how periods and ranges work.")]
    fn reading_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::READING_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(READING_INSTRUCTIONS)]))
    }

    // --- Account ---

    #[tool(description = "Sign in as a user and load their readings")]
    async fn sign_in(
        &self,
        Parameters(p): Parameters<SignInParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(account::sign_in(&self.readings, &p.user_id, p.display_name.as_deref()).await)
    }

    #[tool(description = "Sign out and clear the cached reading list and display name")]
    fn sign_out(&self) -> Result<CallToolResult, McpError> {
        respond(account::sign_out(&self.readings))
    }

    #[tool(description = "Clear locally cached snapshots without signing out")]
    fn clear_cache(&self) -> Result<CallToolResult, McpError> {
        respond(account::clear_cache(&self.readings))
    }

    // --- Readings ---

    #[tool(description = "Record a blood sugar reading for the signed-in user")]
    async fn add_reading(
        &self,
        Parameters(p): Parameters<AddReadingParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(
            readings::add_reading(
                &self.readings,
                p.glucose_level,
                p.meal_context.as_deref(),
                p.notes.as_deref(),
                p.timestamp,
            )
            .await,
        )
    }

    #[tool(description = "List the signed-in user's readings, newest first. Falls back to the last cached list if the store is unavailable.")]
    async fn list_readings(
        &self,
        Parameters(p): Parameters<ListReadingsParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(readings::list_readings(&self.readings, Some(p.limit), p.days).await)
    }

    #[tool(description = "List readings between two dates (YYYY-MM-DD, both inclusive) with their average")]
    async fn list_readings_by_date_range(
        &self,
        Parameters(p): Parameters<ListReadingsByDateRangeParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(
            readings::list_readings_by_date_range(&self.readings, &p.start_date, &p.end_date)
                .await,
        )
    }

    #[tool(description = "Update fields of one of the signed-in user's readings")]
    async fn update_reading(
        &self,
        Parameters(p): Parameters<UpdateReadingParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(
            readings::update_reading(
                &self.readings,
                &p.id,
                p.glucose_level,
                p.timestamp,
                p.notes.as_deref(),
                p.meal_context.as_deref(),
            )
            .await,
        )
    }

    #[tool(description = "Delete one of the signed-in user's readings")]
    async fn delete_reading(
        &self,
        Parameters(p): Parameters<DeleteReadingParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(readings::delete_reading(&self.readings, &p.id).await)
    }

    #[tool(description = "Reload readings from the store without falling back to the cache")]
    async fn refresh_readings(&self) -> Result<CallToolResult, McpError> {
        respond(readings::refresh_readings(&self.readings).await)
    }

    // --- Charts ---

    #[tool(description = "Get the chart series for a period: bars for the last 7 records, daily averages over 30 days, or every reading in the last year")]
    async fn get_chart(
        &self,
        Parameters(p): Parameters<PeriodParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(charts::get_chart(&self.readings, p.period.as_deref()).await)
    }

    #[tool(description = "Get average, max, min, range counts, percentage in range and days since the last reading for a period")]
    async fn get_statistics(
        &self,
        Parameters(p): Parameters<PeriodParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(charts::get_statistics(&self.readings, p.period.as_deref()).await)
    }

    #[tool(description = "Get chart series, statistics and any stale-reading warning for a period")]
    async fn get_period_report(
        &self,
        Parameters(p): Parameters<PeriodParams>,
    ) -> Result<CallToolResult, McpError> {
        respond(charts::get_period_report(&self.readings, p.period.as_deref()).await)
    }

    #[tool(description = "Get the dashboard: latest reading plus reports for every period")]
    async fn get_dashboard(&self) -> Result<CallToolResult, McpError> {
        respond(charts::get_dashboard(&self.readings).await)
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for SweetSyncService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sweetsync".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("SweetSync".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "SweetSync - Blood sugar tracking with charts and statistics. \
                 IMPORTANT: Call reading_instructions before recording readings. \
                 Account: sign_in/sign_out, clear_cache. \
                 Readings: add/update/delete_reading, list_readings, list_readings_by_date_range, refresh_readings. \
                 Charts: get_chart, get_statistics, get_period_report (period = week|month|year), get_dashboard. \
                 Status: sweetsync_status."
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::analytics::{Calendar, ChartAggregator, FixedClock};
    use crate::cache::MemoryStore;
    use crate::repository::{MemoryReadingRepository, Session};

    fn server() -> SweetSyncService {
        let session = Session::signed_in("alice");
        let readings = ReadingsService::new(
            Arc::new(MemoryReadingRepository::new(session.clone())),
            Arc::new(MemoryStore::new()),
            session,
            ChartAggregator::new(Arc::new(FixedClock(1_710_504_000_000)), Calendar::utc()),
        );
        SweetSyncService::new(Arc::new(readings), None)
    }

    #[test]
    fn test_server_info() {
        let info = server().get_info();
        assert_eq!(info.server_info.name, "sweetsync");
        assert!(info.instructions.unwrap().contains("reading_instructions"));
    }

    #[test]
    fn test_tool_errors_become_mcp_errors() {
        assert!(respond::<()>(Err("Failed to add reading: bad".to_string())).is_err());
        assert!(respond(Ok(serde_json::json!({ "ok": true }))).is_ok());
    }

    #[test]
    fn test_list_params_default_limit() {
        let params: ListReadingsParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.limit, 50);
        assert_eq!(params.days, None);

        let params: ListReadingsParams = serde_json::from_str(r#"{"days": 7}"#).unwrap();
        assert_eq!(params.days, Some(7));
    }
}
