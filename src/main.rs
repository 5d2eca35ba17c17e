use clap::Parser;
use r2d2::Pool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use wops_insight::analysis::orchestrator::QueryOrchestrator;
use wops_insight::config::{AppConfig, CliArgs};
use wops_insight::context::{NoBusinessContext, NoFileContext};
use wops_insight::db::db_pool::WarehouseConnectionManager;
use wops_insight::db::gateway::WarehouseGateway;
use wops_insight::llm::LlmManager;
use wops_insight::util::logging::init_tracing;
use wops_insight::web::{self, state::AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_tracing();

    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Initializing warehouse connection pool: {}",
        config.warehouse.connection_string
    );
    let manager = WarehouseConnectionManager::new(config.warehouse.connection_string.clone());
    let pool = Pool::builder()
        .max_size(config.warehouse.pool_size as u32)
        .build(manager)?;

    let gateway = Arc::new(WarehouseGateway::new(
        pool,
        Duration::from_secs(config.warehouse.cache_ttl_secs),
    ));

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = Arc::new(LlmManager::new(&config.llm)?);

    let orchestrator = QueryOrchestrator::new(
        Arc::clone(&gateway),
        llm_manager,
        Arc::new(NoBusinessContext),
        Arc::new(NoFileContext),
    );

    // Warm the metadata cache; the gateway degrades to the unverified table
    // list if the warehouse is unreachable, so only log the outcome.
    info!("Warming table metadata cache");
    let tables = gateway.list_tables().await;
    info!("{} tables available", tables.len());

    let app_state = Arc::new(AppState::new(config.clone(), gateway, orchestrator));

    // Start the web server
    info!(
        "Starting wops-insight server on {}:{}",
        config.web.host, config.web.port
    );
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(
                Box::new(std::io::Error::other(e.to_string())) as Box<dyn std::error::Error>
            );
        }
    }

    Ok(())
}
