use serde::Serialize;
use whutil_core::WarehouseSize;

use crate::error::CliError;

use super::{CommandResult, BUILTIN_SOURCE};

#[derive(Debug, Serialize)]
struct SizeRow {
    warehouse_size: WarehouseSize,
    credits_per_hour: u32,
}

pub fn run() -> Result<CommandResult, CliError> {
    let rows: Vec<SizeRow> = WarehouseSize::ALL
        .into_iter()
        .map(|size| SizeRow {
            warehouse_size: size,
            credits_per_hour: size.credits_per_hour(),
        })
        .collect();

    Ok(CommandResult::ok(
        serde_json::to_value(rows)?,
        BUILTIN_SOURCE,
    ))
}
