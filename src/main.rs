//! SweetSync
//!
//! An MCP server for blood sugar tracking and chart analytics.

use std::sync::Arc;

use rmcp::ServiceExt;
use tokio::io::{stdin, stdout};
use tracing_subscriber::EnvFilter;

use sweetsync::analytics::{ChartAggregator, SystemClock};
use sweetsync::build_info;
use sweetsync::config::{Backend, Config};
use sweetsync::mcp::SweetSyncService;
use sweetsync::service::ReadingsService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging (output to stderr to not interfere with MCP stdio)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sweetsync=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?;

    build_info::print_startup_banner(config.backend.as_str());
    eprintln!("Starting MCP server on stdio...");

    let database_path = match config.backend {
        Backend::Sqlite => {
            eprintln!("Database path: {}", config.database_path.display());
            Some(config.database_path.clone())
        }
        Backend::Memory => None,
    };

    let session = config.session();
    let storage = config.open_storage(session.clone())?;
    let aggregator = ChartAggregator::new(Arc::new(SystemClock), config.calendar);

    let readings = Arc::new(ReadingsService::new(
        storage.repository,
        storage.cache_store,
        session,
        aggregator,
    ));

    if let Some(user_id) = &config.user_id {
        let state = readings.load_readings().await;
        tracing::info!(
            user_id = %user_id,
            "Loaded {} readings{}",
            state.readings.len(),
            if state.from_cache { " from cache" } else { "" }
        );
    }

    // Create the SweetSync service
    let service = SweetSyncService::new(readings, database_path);

    // Start the MCP server on stdio
    let server = service.serve((stdin(), stdout())).await?;

    // Wait for the server to complete
    server.waiting().await?;

    Ok(())
}
