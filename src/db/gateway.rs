use crate::db::db_pool::WarehouseConnectionManager;
use crate::db::{sampler, GatewayError, MAX_RESULT_ROWS};
use duckdb::types::ValueRef;
use r2d2::Pool;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The reporting tables operators are allowed to query. Each entry is probed
/// at cache-fill time; only tables that answer the probe make the allow-list.
pub const CANDIDATE_TABLES: &[&str] = &[
    "RPT_WOPS_AGENT_PERFORMANCE",
    "ZENDESK_TICKET_AGENT__HANDLE_TIME",
    "RPT_WOPS_TICKETS",
    "RPT_WOPS_TL_PERFORMANCE",
    "RPT_AGENT_SCHEDULE_ADHERENCE",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub table: String,
    pub columns: Vec<ColumnMeta>,
}

impl TableMetadata {
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// One scalar value in a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(v) => Some(*v as f64),
            Cell::Float(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Bool(b) => serde_json::Value::Bool(*b),
            Cell::Int(v) => serde_json::Value::from(*v),
            Cell::Float(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Cell::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

/// A fully materialized query result. Row count never exceeds
/// [`MAX_RESULT_ROWS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
    pub row_count: usize,
}

impl ResultSet {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let row_count = rows.len();
        Self {
            columns,
            rows,
            row_count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows as column→value records, for JSON responses and prompt snippets.
    pub fn records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row.iter())
                    .map(|(name, cell)| (name.clone(), cell.to_json()))
                    .collect()
            })
            .collect()
    }

    /// True when every non-null value in the column is numeric and at least
    /// one such value exists.
    pub fn is_numeric_column(&self, index: usize) -> bool {
        let mut seen = false;
        for row in &self.rows {
            match row.get(index) {
                Some(Cell::Null) | None => {}
                Some(cell) if cell.as_f64().is_some() => seen = true,
                Some(_) => return false,
            }
        }
        seen
    }

    /// True when the column holds at least one text value and no numerics.
    pub fn is_text_column(&self, index: usize) -> bool {
        let mut seen = false;
        for row in &self.rows {
            match row.get(index) {
                Some(Cell::Text(_)) => seen = true,
                Some(Cell::Null) | None => {}
                Some(_) => return false,
            }
        }
        seen
    }
}

struct CacheState {
    epoch: Option<Instant>,
    tables: Option<Vec<String>>,
    schemas: HashMap<String, TableMetadata>,
}

impl CacheState {
    fn empty() -> Self {
        Self {
            epoch: None,
            tables: None,
            schemas: HashMap::new(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.epoch.map(|e| e.elapsed() < ttl).unwrap_or(false)
    }

    /// A stale epoch drops the allow-list and every schema entry together
    /// before anything new is admitted.
    fn ensure_epoch(&mut self, ttl: Duration) {
        if !self.is_fresh(ttl) {
            self.tables = None;
            self.schemas.clear();
            self.epoch = Some(Instant::now());
        }
    }
}

/// Owns the warehouse pool, the table allow-list, and per-table column
/// metadata. All cached state sits behind one lock and shares one epoch.
pub struct WarehouseGateway {
    pool: Pool<WarehouseConnectionManager>,
    cache: RwLock<CacheState>,
    ttl: Duration,
}

impl WarehouseGateway {
    pub fn new(pool: Pool<WarehouseConnectionManager>, ttl: Duration) -> Self {
        Self {
            pool,
            cache: RwLock::new(CacheState::empty()),
            ttl,
        }
    }

    /// Returns the verified allow-list, probing and re-stamping the epoch when
    /// the cache is stale. If the warehouse cannot be reached at all, the
    /// unverified candidate list is returned (and not cached).
    pub async fn list_tables(&self) -> Vec<String> {
        {
            let state = self.cache.read().await;
            if state.is_fresh(self.ttl) {
                if let Some(tables) = &state.tables {
                    debug!("Returning cached table list");
                    return tables.clone();
                }
            }
        }

        info!("Probing and caching table list");
        let pool = self.pool.clone();
        let probed = tokio::task::spawn_blocking(move || probe_candidate_tables(&pool)).await;

        match probed {
            Ok(Ok(verified)) => {
                let mut state = self.cache.write().await;
                state.ensure_epoch(self.ttl);
                state.tables = Some(verified.clone());
                info!("Available tables cached: {:?}", verified);
                verified
            }
            Ok(Err(e)) => {
                warn!("Table verification failed ({}), returning unverified candidate list", e);
                CANDIDATE_TABLES.iter().map(|t| t.to_string()).collect()
            }
            Err(e) => {
                warn!("Table probe task failed ({}), returning unverified candidate list", e);
                CANDIDATE_TABLES.iter().map(|t| t.to_string()).collect()
            }
        }
    }

    /// Returns column metadata for one table, cached under the shared epoch.
    /// Introspection failure degrades to a generic all-VARCHAR schema derived
    /// from a 1-row probe so downstream prompting keeps working.
    pub async fn get_schema(&self, table: &str) -> TableMetadata {
        {
            let state = self.cache.read().await;
            if state.is_fresh(self.ttl) {
                if let Some(schema) = state.schemas.get(table) {
                    debug!("Returning cached schema for {}", table);
                    return schema.clone();
                }
            }
        }

        info!("Fetching and caching schema for {}", table);
        let pool = self.pool.clone();
        let table_name = table.to_string();
        let introspected =
            tokio::task::spawn_blocking(move || introspect_table(&pool, &table_name)).await;

        let schema = match introspected {
            Ok(Ok(schema)) if !schema.is_empty() => schema,
            other => {
                if let Ok(Err(e)) = &other {
                    warn!("Schema introspection failed for {}: {}", table, e);
                }
                let pool = self.pool.clone();
                let table_name = table.to_string();
                match tokio::task::spawn_blocking(move || probe_columns(&pool, &table_name)).await {
                    Ok(Ok(schema)) => {
                        info!(
                            "Synthesized generic schema for {} from sample probe: {} columns",
                            table,
                            schema.columns.len()
                        );
                        schema
                    }
                    _ => {
                        warn!("Fallback schema probe also failed for {}", table);
                        TableMetadata {
                            table: table.to_string(),
                            columns: Vec::new(),
                        }
                    }
                }
            }
        };

        let mut state = self.cache.write().await;
        state.ensure_epoch(self.ttl);
        state.schemas.insert(table.to_string(), schema.clone());
        schema
    }

    /// Limited row fetch; `ordered` asks for the latest rows by the sampler's
    /// heuristic recency column, degrading to a plain scan on failure.
    pub async fn sample(
        &self,
        table: &str,
        limit: usize,
        ordered: bool,
    ) -> Result<ResultSet, GatewayError> {
        if ordered {
            let schema = self.get_schema(table).await;
            if let Some(column) = sampler::pick_order_column(&schema).map(str::to_string) {
                let sql = sampler::build_sample_query(table, limit, Some(&column));
                match self.execute(&sql).await {
                    Ok(result) => return Ok(result),
                    Err(e) => {
                        warn!("Ordered sample failed for {} ({}), falling back", table, e)
                    }
                }
            }
        }

        let sql = sampler::build_sample_query(table, limit, None);
        self.execute(&sql).await
    }

    /// Executes a statement and materializes the result. The statement is
    /// clamped to [`MAX_RESULT_ROWS`] both in SQL and during materialization.
    pub async fn execute(&self, sql: &str) -> Result<ResultSet, GatewayError> {
        let sql = apply_row_limit(sql);
        debug!("Executing: {}", sql);

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || run_statement(&pool, &sql))
            .await
            .map_err(|e| GatewayError::TaskError(e.to_string()))??;

        info!("Query executed successfully, returned {} rows", result.row_count);
        Ok(result)
    }

    /// Drops all cached state immediately.
    pub async fn invalidate(&self) {
        info!("Invalidating schema cache");
        let mut state = self.cache.write().await;
        *state = CacheState::empty();
    }
}

/// Appends `LIMIT 200` when the statement does not already carry a LIMIT
/// clause, keeping a trailing semicolon where one exists.
pub fn apply_row_limit(sql: &str) -> String {
    static LIMIT_WORD: OnceLock<Regex> = OnceLock::new();
    let pattern = LIMIT_WORD.get_or_init(|| Regex::new(r"\bLIMIT\b").expect("limit pattern"));

    if pattern.is_match(&sql.to_uppercase()) {
        return sql.to_string();
    }

    let trimmed = sql.trim_end();
    match trimmed.strip_suffix(';') {
        Some(body) => format!("{} LIMIT {};", body.trim_end(), MAX_RESULT_ROWS),
        None => format!("{} LIMIT {}", trimmed, MAX_RESULT_ROWS),
    }
}

fn probe_candidate_tables(
    pool: &Pool<WarehouseConnectionManager>,
) -> Result<Vec<String>, GatewayError> {
    let conn = pool.get()?;
    let mut verified = Vec::new();

    for table in CANDIDATE_TABLES {
        let sql = format!("SELECT 1 FROM \"{}\" LIMIT 1", table);
        let probe = (|| -> Result<(), duckdb::Error> {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query([])?;
            let _ = rows.next()?;
            Ok(())
        })();

        match probe {
            Ok(()) => verified.push(table.to_string()),
            Err(e) => warn!("Table {} not found or not accessible: {}", table, e),
        }
    }

    Ok(verified)
}

fn introspect_table(
    pool: &Pool<WarehouseConnectionManager>,
    table: &str,
) -> Result<TableMetadata, GatewayError> {
    let conn = pool.get()?;

    let mut stmt = conn.prepare(
        "SELECT column_name, data_type, is_nullable, column_default \
         FROM information_schema.columns \
         WHERE table_name = ? \
         ORDER BY ordinal_position",
    )?;

    let columns = stmt
        .query_map([table], |row| {
            Ok(ColumnMeta {
                name: row.get::<_, String>(0)?,
                data_type: row.get::<_, String>(1)?,
                nullable: row.get::<_, String>(2)? == "YES",
                default: row.get::<_, Option<String>>(3)?,
            })
        })?
        .filter_map(Result::ok)
        .collect::<Vec<ColumnMeta>>();

    Ok(TableMetadata {
        table: table.to_string(),
        columns,
    })
}

/// Degraded-mode schema: column names from a 1-row probe, everything typed as
/// VARCHAR and nullable.
fn probe_columns(
    pool: &Pool<WarehouseConnectionManager>,
    table: &str,
) -> Result<TableMetadata, GatewayError> {
    let conn = pool.get()?;
    let sql = format!("SELECT * FROM \"{}\" LIMIT 1", table);

    let mut stmt = conn.prepare(&sql)?;
    // Same driver constraint as run_statement: execute before reading names.
    let rows = stmt.query([])?;
    let executed = rows
        .as_ref()
        .ok_or_else(|| GatewayError::ExecutionError("statement unavailable".to_string()))?;
    let column_count = executed.column_count();
    let mut columns = Vec::with_capacity(column_count);
    for i in 0..column_count {
        if let Ok(name) = executed.column_name(i) {
            columns.push(ColumnMeta {
                name: name.to_string(),
                data_type: "VARCHAR".to_string(),
                nullable: true,
                default: None,
            });
        }
    }

    Ok(TableMetadata {
        table: table.to_string(),
        columns,
    })
}

fn run_statement(
    pool: &Pool<WarehouseConnectionManager>,
    sql: &str,
) -> Result<ResultSet, GatewayError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(sql)?;

    // Column metadata is only available once the statement has executed;
    // reading it earlier panics inside the driver.
    let mut rows = stmt.query([])?;
    let executed = rows
        .as_ref()
        .ok_or_else(|| GatewayError::ExecutionError("statement unavailable".to_string()))?;
    let column_count = executed.column_count();
    let mut columns = Vec::with_capacity(column_count);
    for i in 0..column_count {
        match executed.column_name(i) {
            Ok(name) => columns.push(name.to_string()),
            Err(_) => columns.push(format!("column_{}", i)),
        }
    }

    let mut materialized = Vec::new();
    while let Some(row) = rows.next()? {
        if materialized.len() >= MAX_RESULT_ROWS {
            break;
        }
        let mut cells = Vec::with_capacity(column_count);
        for i in 0..column_count {
            cells.push(cell_from_row(row, i));
        }
        materialized.push(cells);
    }

    Ok(ResultSet::new(columns, materialized))
}

fn cell_from_row(row: &duckdb::Row<'_>, index: usize) -> Cell {
    match row.get_ref(index) {
        Ok(ValueRef::Null) => Cell::Null,
        Ok(ValueRef::Boolean(v)) => Cell::Bool(v),
        Ok(ValueRef::TinyInt(v)) => Cell::Int(v as i64),
        Ok(ValueRef::SmallInt(v)) => Cell::Int(v as i64),
        Ok(ValueRef::Int(v)) => Cell::Int(v as i64),
        Ok(ValueRef::BigInt(v)) => Cell::Int(v),
        Ok(ValueRef::HugeInt(v)) => Cell::Int(v as i64),
        Ok(ValueRef::UTinyInt(v)) => Cell::Int(v as i64),
        Ok(ValueRef::USmallInt(v)) => Cell::Int(v as i64),
        Ok(ValueRef::UInt(v)) => Cell::Int(v as i64),
        Ok(ValueRef::UBigInt(v)) => Cell::Int(v as i64),
        Ok(ValueRef::Float(v)) => Cell::Float(v as f64),
        Ok(ValueRef::Double(v)) => Cell::Float(v),
        Ok(ValueRef::Decimal(d)) => d
            .to_string()
            .parse::<f64>()
            .map(Cell::Float)
            .unwrap_or(Cell::Null),
        Ok(ValueRef::Date32(days)) => date_cell(days),
        Ok(ValueRef::Timestamp(unit, v)) => timestamp_cell(unit, v),
        Ok(ValueRef::Time64(unit, v)) => time_cell(unit, v),
        Ok(ValueRef::Text(_)) => match row.get::<_, String>(index) {
            Ok(text) => Cell::Text(text),
            Err(_) => Cell::Null,
        },
        // Intervals, lists, structs and anything else render through the
        // driver's string conversion where it exists.
        Ok(_) => match row.get::<_, String>(index) {
            Ok(text) => Cell::Text(text),
            Err(_) => Cell::Null,
        },
        Err(_) => Cell::Null,
    }
}

fn date_cell(days_since_epoch: i32) -> Cell {
    chrono::DateTime::from_timestamp(days_since_epoch as i64 * 86_400, 0)
        .map(|dt| Cell::Text(dt.format("%Y-%m-%d").to_string()))
        .unwrap_or(Cell::Null)
}

fn unit_micros(unit: duckdb::types::TimeUnit, value: i64) -> i64 {
    use duckdb::types::TimeUnit;
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn timestamp_cell(unit: duckdb::types::TimeUnit, value: i64) -> Cell {
    chrono::DateTime::from_timestamp_micros(unit_micros(unit, value))
        .map(|dt| Cell::Text(dt.format("%Y-%m-%d %H:%M:%S%.6f").to_string()))
        .unwrap_or(Cell::Null)
}

fn time_cell(unit: duckdb::types::TimeUnit, value: i64) -> Cell {
    let micros = unit_micros(unit, value);
    let secs = (micros / 1_000_000) as u32;
    let nanos = ((micros % 1_000_000) * 1_000) as u32;
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        .map(|t| Cell::Text(t.format("%H:%M:%S%.6f").to_string()))
        .unwrap_or(Cell::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_appended_when_absent() {
        assert_eq!(
            apply_row_limit("SELECT AGENT_NAME FROM RPT_AGENT_SCHEDULE_ADHERENCE"),
            "SELECT AGENT_NAME FROM RPT_AGENT_SCHEDULE_ADHERENCE LIMIT 200"
        );
    }

    #[test]
    fn trailing_semicolon_is_preserved() {
        assert_eq!(
            apply_row_limit("SELECT 1;"),
            "SELECT 1 LIMIT 200;"
        );
    }

    #[test]
    fn existing_limit_is_untouched() {
        assert_eq!(apply_row_limit("SELECT 1 LIMIT 5"), "SELECT 1 LIMIT 5");
        assert_eq!(
            apply_row_limit("select * from t limit 10;"),
            "select * from t limit 10;"
        );
    }

    #[test]
    fn limit_inside_identifier_does_not_count() {
        assert_eq!(
            apply_row_limit("SELECT RATE_LIMITED FROM T"),
            "SELECT RATE_LIMITED FROM T LIMIT 200"
        );
    }

    #[test]
    fn numeric_and_text_column_detection() {
        let rs = ResultSet::new(
            vec!["REGION".to_string(), "COUNT".to_string()],
            vec![
                vec![Cell::Text("EMEA".to_string()), Cell::Int(4)],
                vec![Cell::Null, Cell::Int(7)],
            ],
        );
        assert!(rs.is_text_column(0));
        assert!(!rs.is_numeric_column(0));
        assert!(rs.is_numeric_column(1));
        assert!(!rs.is_text_column(1));
    }

    #[test]
    fn records_align_columns_and_cells() {
        let rs = ResultSet::new(
            vec!["A".to_string(), "B".to_string()],
            vec![vec![Cell::Int(1), Cell::Text("x".to_string())]],
        );
        let records = rs.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["A"], serde_json::json!(1));
        assert_eq!(records[0]["B"], serde_json::json!("x"));
    }

    #[test]
    fn non_finite_float_renders_as_json_null() {
        assert_eq!(Cell::Float(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(
            Cell::Float(f64::INFINITY).to_json(),
            serde_json::Value::Null
        );
    }
}
