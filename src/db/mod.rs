pub mod db_pool;
pub mod gateway;
pub mod sampler;
pub mod validator;

use std::error::Error;
use std::fmt;

/// Every executed statement is clamped to this many rows, regardless of what
/// the statement itself asks for.
pub const MAX_RESULT_ROWS: usize = 200;

#[derive(Debug)]
pub enum GatewayError {
    PoolError(String),
    ExecutionError(String),
    MetadataError(String),
    TaskError(String),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::PoolError(msg) => write!(f, "Connection pool error: {}", msg),
            GatewayError::ExecutionError(msg) => write!(f, "Query execution failed: {}", msg),
            GatewayError::MetadataError(msg) => write!(f, "Schema introspection failed: {}", msg),
            GatewayError::TaskError(msg) => write!(f, "Warehouse task failed: {}", msg),
        }
    }
}

impl Error for GatewayError {}

impl From<r2d2::Error> for GatewayError {
    fn from(err: r2d2::Error) -> Self {
        GatewayError::PoolError(err.to_string())
    }
}

impl From<duckdb::Error> for GatewayError {
    fn from(err: duckdb::Error) -> Self {
        GatewayError::ExecutionError(err.to_string())
    }
}
