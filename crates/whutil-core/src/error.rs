use thiserror::Error;

/// Validation and contract errors exposed by `whutil-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("end date {end} must be after start date {start}")]
    EmptyDateRange { start: String, end: String },

    #[error("invalid timestamp '{value}', expected YYYY-MM-DD HH:MM:SS")]
    InvalidTimestamp { value: String },

    #[error("invalid warehouse size '{value}', expected one of X-Small .. 6X-Large")]
    InvalidWarehouseSize { value: String },

    #[error("table reference cannot be empty")]
    EmptyTableReference,
    #[error("table reference '{value}' is not a plain [schema.]table identifier")]
    InvalidTableReference { value: String },

    #[error("field '{field}' must be finite")]
    NonFiniteValue { field: &'static str },
    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
    #[error("field '{field}' is out of range: {value}")]
    ValueOutOfRange { field: &'static str, value: String },

    #[error("request_id must be at least 8 characters")]
    InvalidRequestId,
    #[error("trace_id must be 32 hex characters")]
    InvalidTraceId,
    #[error("schema_version must match vMAJOR.MINOR.PATCH: '{value}'")]
    InvalidSchemaVersion { value: String },
    #[error("source cannot be empty")]
    EmptySource,

    #[error("error code cannot be empty")]
    EmptyErrorCode,
    #[error("error message cannot be empty")]
    EmptyErrorMessage,
    #[error("a failure envelope needs at least one error")]
    MissingErrors,
}

/// Failure of a single report run.
///
/// Validation failures are raised before the source is touched; execution
/// failures carry whatever the source reported, unchanged.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("query execution failed: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl ReportError {
    pub fn execution<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Execution(Box::new(error))
    }
}
