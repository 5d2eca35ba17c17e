use crate::analysis::orchestrator::QueryOrchestrator;
use crate::config::AppConfig;
use crate::db::gateway::WarehouseGateway;
use std::sync::Arc;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub gateway: Arc<WarehouseGateway>,
    pub orchestrator: QueryOrchestrator,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        gateway: Arc<WarehouseGateway>,
        orchestrator: QueryOrchestrator,
    ) -> Self {
        Self {
            config,
            gateway,
            orchestrator,
            startup_time: chrono::Utc::now(),
        }
    }
}
