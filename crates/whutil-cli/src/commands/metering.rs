use whutil_core::{run_metering, ReportContext, SourceTables};
use whutil_warehouse::Warehouse;

use crate::cli::MeteringArgs;
use crate::error::CliError;

use super::{CommandResult, WAREHOUSE_SOURCE};

pub fn run(args: &MeteringArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let defaults = SourceTables::default();
    let context = ReportContext::parse(
        args.range.start.as_str(),
        args.range.end.as_str(),
        defaults.query_history.as_str(),
        args.metering_table.as_str(),
    )?;

    let report = run_metering(warehouse, &context)?;
    let mut result = CommandResult::ok(serde_json::to_value(&report)?, WAREHOUSE_SOURCE);
    if report.series.points.is_empty() {
        result = result.with_warning(format!("no metering rows in {}", context.range));
    }

    Ok(result)
}
