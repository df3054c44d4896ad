use thiserror::Error;
use whutil_core::ValidationError;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Input or stored data failed domain validation.
    #[error("invalid data: {0}")]
    InvalidData(#[from] ValidationError),

    /// Request was refused before reaching the engine.
    #[error("query rejected: {0}")]
    QueryRejected(String),
}
