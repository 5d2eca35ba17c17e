use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::analysis::orchestrator::AskRequest;
use crate::analysis::results;
use crate::db::gateway::TableMetadata;
use crate::db::validator;
use crate::web::state::AppState;

// Query types

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ExecuteQueryResponse {
    pub columns: Vec<String>,
    pub data: Vec<serde_json::Map<String, serde_json::Value>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SampleParams {
    #[serde(default = "default_sample_limit")]
    pub limit: usize,
    #[serde(default = "default_ordered")]
    pub ordered: bool,
}

fn default_sample_limit() -> usize {
    10
}

fn default_ordered() -> bool {
    true
}

// Table metadata types

#[derive(Debug, Serialize)]
pub struct TableList {
    pub tables: Vec<String>,
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub table_count: usize,
    pub llm_backend: String,
}

// API Implementations

// Natural language question through the full pipeline. Failures surface in
// the body's `success` flag rather than as HTTP errors.
pub async fn ask(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AskRequest>,
) -> impl IntoResponse {
    info!("Processing question: {}", payload.question);
    let answer = state.orchestrator.answer(payload).await;
    Json(answer)
}

// Direct SQL execution, still subject to validation and the row cap
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteQueryRequest>,
) -> Result<Json<ExecuteQueryResponse>, (StatusCode, String)> {
    let start_time = Instant::now();
    info!("Executing SQL query: {}", payload.query);

    if !validator::validate_sql(&payload.query) {
        return Err((
            StatusCode::BAD_REQUEST,
            "Query contains forbidden operations".to_string(),
        ));
    }

    let result = state.gateway.execute(&payload.query).await.map_err(|e| {
        error!("Query execution failed: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("SQL error: {}", e))
    })?;

    let cleaned = results::clean(result);

    Ok(Json(ExecuteQueryResponse {
        columns: cleaned.columns.clone(),
        row_count: cleaned.row_count,
        data: cleaned.records(),
        execution_time_ms: start_time.elapsed().as_millis() as u64,
    }))
}

pub async fn list_tables(State(state): State<Arc<AppState>>) -> Json<TableList> {
    let tables = state.gateway.list_tables().await;
    Json(TableList { tables })
}

// Degraded schemas (empty column list) still answer with 200; the pipeline
// treats them as "schema not available" rather than an error.
pub async fn get_table_schema(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
) -> Json<TableMetadata> {
    Json(state.gateway.get_schema(&table).await)
}

pub async fn sample_table(
    State(state): State<Arc<AppState>>,
    Path(table): Path<String>,
    Query(params): Query<SampleParams>,
) -> Result<Json<ExecuteQueryResponse>, (StatusCode, String)> {
    let start_time = Instant::now();

    let result = state
        .gateway
        .sample(&table, params.limit, params.ordered)
        .await
        .map_err(|e| {
            error!("Sample failed for {}: {}", table, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Sample error: {}", e),
            )
        })?;

    let cleaned = results::clean(result);

    Ok(Json(ExecuteQueryResponse {
        columns: cleaned.columns.clone(),
        row_count: cleaned.row_count,
        data: cleaned.records(),
        execution_time_ms: start_time.elapsed().as_millis() as u64,
    }))
}

pub async fn invalidate_cache(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    state.gateway.invalidate().await;
    Json(serde_json::json!({ "status": "cache invalidated" }))
}

pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(state.startup_time).num_seconds();
    let table_count = state.gateway.list_tables().await.len();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        table_count,
        llm_backend: state.config.llm.backend.clone(),
    })
}
