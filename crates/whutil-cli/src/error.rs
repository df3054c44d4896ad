use thiserror::Error;
use whutil_core::{ReportError, ValidationError};
use whutil_warehouse::WarehouseError;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Report(#[from] ReportError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("command error: {0}")]
    Command(String),

    #[error("strict mode failed: warnings={warning_count}")]
    StrictModeViolation { warning_count: usize },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Category reported in the `errors` block of a failure envelope.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Report(ReportError::Validation(_)) => "validation",
            Self::Warehouse(WarehouseError::InvalidData(_)) => "invalid_data",
            Self::Report(ReportError::Execution(_)) | Self::Warehouse(WarehouseError::DuckDb(_)) => {
                "execution"
            }
            Self::Warehouse(WarehouseError::QueryRejected(_)) | Self::Command(_) => "rejected",
            Self::StrictModeViolation { .. } => "strict_mode",
            Self::Serialization(_) => "serialization",
            Self::Warehouse(WarehouseError::Io(_)) | Self::Io(_) => "io",
        }
    }

    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Report(_) => 2,
            Self::Warehouse(WarehouseError::Io(_)) => 10,
            Self::Warehouse(_) => 2,
            Self::Command(_) => 2,
            Self::StrictModeViolation { .. } => 5,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
