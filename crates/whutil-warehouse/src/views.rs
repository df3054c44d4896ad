//! Derived views over the usage tables, readable through `whutil inspect`.

use ::duckdb::Connection;
use whutil_core::capacity_case_expression;

/// Create (or refresh) the analysis views.
///
/// - `vw_query_hourly`: query count, elapsed time and expected credits per
///   warehouse hour
/// - `vw_metering_daily`: billed credits per warehouse and day
///
/// # Errors
/// Returns an error if the view creation SQL fails to execute.
pub fn create_views(connection: &Connection) -> Result<(), ::duckdb::Error> {
    let sql = format!(
        r"
CREATE OR REPLACE VIEW vw_query_hourly AS
SELECT
    date_trunc('hour', start_time) AS hour_bucket,
    warehouse_id,
    warehouse_name,
    warehouse_size,
    COUNT(*) AS num_queries,
    SUM(total_elapsed_time) AS total_elapsed_time_ms,
    SUM(CAST(total_elapsed_time AS DOUBLE) / 3600000 * {capacity}) AS expected_credits
FROM query_history
WHERE warehouse_size IS NOT NULL
GROUP BY 1, 2, 3, 4;

CREATE OR REPLACE VIEW vw_metering_daily AS
SELECT
    CAST(start_time AS DATE) AS usage_date,
    warehouse_id,
    warehouse_name,
    SUM(credits_used) AS credits_used
FROM warehouse_metering_history
GROUP BY 1, 2, 3;
",
        capacity = capacity_case_expression("warehouse_size"),
    );
    connection.execute_batch(&sql)?;

    Ok(())
}
