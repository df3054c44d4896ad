use whutil_core::{run_report, ReportContext};
use whutil_warehouse::Warehouse;

use crate::cli::ReportArgs;
use crate::error::CliError;

use super::{CommandResult, WAREHOUSE_SOURCE};

pub fn run(args: &ReportArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let context = ReportContext::parse(
        args.range.start.as_str(),
        args.range.end.as_str(),
        args.query_table.as_str(),
        args.metering_table.as_str(),
    )?;

    let report = run_report(warehouse, &context)?;
    let warnings: Vec<String> = report.anomalies.iter().map(ToString::to_string).collect();

    let mut result =
        CommandResult::ok(serde_json::to_value(&report)?, WAREHOUSE_SOURCE).with_warnings(warnings);
    if report.summaries.is_empty() {
        result = result.with_warning(format!(
            "no billed warehouse activity between {} and {}",
            context.range.start(),
            context.range.end()
        ));
    }

    Ok(result)
}
