mod inspect;
mod load;
mod metering;
mod report;
mod sizes;

use std::time::Instant;

use serde_json::Value;
use tracing::debug;
use whutil_core::{Envelope, EnvelopeError};
use whutil_warehouse::{Dataset, Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command, LoadCommand};
use crate::error::CliError;
use crate::metadata::{Metadata, RequestId, SCHEMA_VERSION};

pub const WAREHOUSE_SOURCE: &str = "duckdb";
pub const BUILTIN_SOURCE: &str = "builtin";
/// Source recorded when a command failed before any backend answered.
pub const FAILURE_SOURCE: &str = "whutil";

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub source: &'static str,
}

impl CommandResult {
    pub fn ok(data: Value, source: &'static str) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            source,
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn with_warnings(mut self, warnings: impl IntoIterator<Item = String>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}

pub fn run(cli: &Cli) -> Result<Envelope<Value>, CliError> {
    let started = Instant::now();
    let request_id = RequestId::new_v4();
    debug!(%request_id, command = ?cli.command, "dispatching command");

    let command_result = match &cli.command {
        Command::Report(args) => report::run(args, &open_warehouse(cli)?)?,
        Command::Metering(args) => metering::run(args, &open_warehouse(cli)?)?,
        Command::Sizes => sizes::run()?,
        Command::Load(args) => {
            let warehouse = open_warehouse(cli)?;
            match &args.command {
                LoadCommand::QueryHistory(file) => {
                    load::run(&warehouse, Dataset::QueryHistory, file, request_id)?
                }
                LoadCommand::Metering(file) => {
                    load::run(&warehouse, Dataset::MeteringHistory, file, request_id)?
                }
            }
        }
        Command::Inspect(args) => inspect::run(args, &open_warehouse(cli)?)?,
    };

    let CommandResult {
        data,
        warnings,
        source,
    } = command_result;

    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let mut metadata = Metadata::new(request_id, source, latency_ms);
    for warning in warnings {
        metadata.push_warning(warning);
    }

    let meta = metadata.into_envelope_meta(SCHEMA_VERSION)?;
    Ok(Envelope::success(meta, data))
}

/// Envelope reporting `error` in place of data.
pub fn failure(error: &CliError, latency_ms: u64) -> Result<Envelope<Value>, CliError> {
    let meta = Metadata::new(RequestId::new_v4(), FAILURE_SOURCE, latency_ms)
        .into_envelope_meta(SCHEMA_VERSION)?;
    let error = EnvelopeError::new(error.code(), error.to_string())?;
    Ok(Envelope::failure(meta, vec![error])?)
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db {
        Some(path) => WarehouseConfig::for_db_path(path.clone()),
        None => WarehouseConfig::default(),
    };
    Ok(Warehouse::open(config)?)
}
