use whutil_warehouse::{Dataset, Warehouse};

use crate::cli::LoadFileArgs;
use crate::error::CliError;
use crate::metadata::RequestId;

use super::{CommandResult, WAREHOUSE_SOURCE};

pub fn run(
    warehouse: &Warehouse,
    dataset: Dataset,
    args: &LoadFileArgs,
    request_id: RequestId,
) -> Result<CommandResult, CliError> {
    let report = warehouse.load_csv(dataset, args.path.as_path(), request_id.to_string().as_str())?;

    let mut result = CommandResult::ok(serde_json::to_value(&report)?, WAREHOUSE_SOURCE);
    if report.rows_loaded == 0 {
        result = result.with_warning(format!(
            "{} contained no loadable {} rows",
            args.path.display(),
            dataset
        ));
    }

    Ok(result)
}
