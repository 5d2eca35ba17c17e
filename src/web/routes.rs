use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// REST API for the insight pipeline
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Query endpoints
            .route("/ask", post(handlers::api::ask))
            .route("/query", post(handlers::api::execute_query))
            // Table metadata and samples
            .route("/tables", get(handlers::api::list_tables))
            .route("/tables/{table}/schema", get(handlers::api::get_table_schema))
            .route("/tables/{table}/sample", get(handlers::api::sample_table))
            // Cache control
            .route("/cache/invalidate", post(handlers::api::invalidate_cache))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
