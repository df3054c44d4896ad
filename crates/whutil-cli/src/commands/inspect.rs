use whutil_core::DateRange;
use whutil_warehouse::{UsageRelation, Warehouse};

use crate::cli::InspectArgs;
use crate::error::CliError;

use super::{CommandResult, WAREHOUSE_SOURCE};

pub fn run(args: &InspectArgs, warehouse: &Warehouse) -> Result<CommandResult, CliError> {
    let relation = args.relation.parse::<UsageRelation>()?;
    let range = match (&args.start, &args.end) {
        (Some(start), Some(end)) => Some(DateRange::parse(start, end)?),
        (None, None) => None,
        _ => {
            return Err(CliError::Command(String::from(
                "--start and --end must be given together",
            )))
        }
    };

    let rows = warehouse.inspect(relation, range.as_ref(), args.limit)?;
    let truncated = rows.truncated;
    let row_count = rows.row_count;

    let mut result = CommandResult::ok(serde_json::to_value(&rows)?, WAREHOUSE_SOURCE);
    if truncated {
        result = result.with_warning(format!(
            "{relation} has more rows; showing the first {row_count} (raise --limit to see more)"
        ));
    }

    Ok(result)
}
