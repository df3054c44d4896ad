//! SQL for the utilization and metering reads.
//!
//! Queries are emitted as text plus positional parameters. Date bounds are
//! always bound; only validated [`TableRef`](crate::TableRef)s and the static
//! size table are spliced into the text.
//!
//! The utilization query aggregates in two levels:
//!
//! ```text
//! query log ──┐
//!             ├─ LEFT JOIN on (warehouse_id, hour) ─▶ hour buckets ─▶ per (warehouse, size)
//! metering ───┘      COUNT / SUM / MAX per bucket          SUM per warehouse/size
//! ```
//!
//! Several query rows land in the same hour bucket and all of them join the
//! same metering row, so the bucket keeps `MAX(credits_used)` and only the
//! outer level sums across hours.

use crate::{DateRange, SourceTables, WarehouseSize};

/// Milliseconds per hour, the divisor turning elapsed time into hours.
pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Build a `CASE` expression mapping a size label column to its capacity.
///
/// Labels compare case-insensitively; anything outside the size table yields 0.
pub fn capacity_case_expression(column: &str) -> String {
    let mut expression = format!("CASE upper({column})");
    for size in WarehouseSize::ALL {
        expression.push_str(&format!(
            " WHEN '{}' THEN {}",
            size.as_str().to_ascii_uppercase(),
            size.credits_per_hour()
        ));
    }
    expression.push_str(" ELSE 0 END");
    expression
}

/// Per warehouse/size usage aggregation over a date range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtilizationQuery {
    range: DateRange,
    tables: SourceTables,
}

impl UtilizationQuery {
    pub fn new(range: DateRange, tables: SourceTables) -> Self {
        Self { range, tables }
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    pub fn tables(&self) -> &SourceTables {
        &self.tables
    }

    /// Result columns, in order: `warehouse_name`, `warehouse_size`,
    /// `num_queries`, `total_elapsed_time_ms`, `expected_credits`,
    /// `actual_credits`.
    pub fn sql(&self) -> String {
        format!(
            r"
SELECT
    warehouse_name,
    warehouse_size,
    CAST(SUM(num_queries) AS BIGINT) AS num_queries,
    CAST(SUM(total_elapsed_time) AS DOUBLE) AS total_elapsed_time_ms,
    CAST(SUM(expected_credits) AS DOUBLE) AS expected_credits,
    CAST(SUM(credits_used) AS DOUBLE) AS actual_credits
FROM (
    SELECT
        date_trunc('hour', q.start_time) AS hour_bucket,
        q.warehouse_id,
        q.warehouse_name,
        q.warehouse_size,
        AVG(q.cluster_number) AS cluster_number,
        COUNT(*) AS num_queries,
        SUM(q.total_elapsed_time) AS total_elapsed_time,
        SUM(CAST(q.total_elapsed_time AS DOUBLE) / {ms_per_hour} * {capacity}) AS expected_credits,
        MAX(m.credits_used) AS credits_used
    FROM {query_history} q
    LEFT JOIN {metering_history} m
        ON m.warehouse_id = q.warehouse_id
        AND m.start_time = date_trunc('hour', q.start_time)
    WHERE q.warehouse_size IS NOT NULL
        AND q.start_time >= CAST(? AS TIMESTAMP)
        AND q.start_time < CAST(? AS TIMESTAMP)
    GROUP BY 1, 2, 3, 4
) hour_buckets
GROUP BY 1, 2
ORDER BY 1 ASC, 2 ASC",
            ms_per_hour = MS_PER_HOUR as u64,
            capacity = capacity_case_expression("q.warehouse_size"),
            query_history = self.tables.query_history,
            metering_history = self.tables.metering_history,
        )
    }

    /// Positional parameters: inclusive start, exclusive end.
    pub fn params(&self) -> [String; 2] {
        [self.range.start_bound(), self.range.end_bound()]
    }
}

/// Range-filtered scan of the metering table for the credit charts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeteringQuery {
    range: DateRange,
    tables: SourceTables,
}

impl MeteringQuery {
    pub fn new(range: DateRange, tables: SourceTables) -> Self {
        Self { range, tables }
    }

    pub fn range(&self) -> &DateRange {
        &self.range
    }

    /// Result columns, in order: `warehouse_id`, `warehouse_name`,
    /// `start_time` (as text), `credits_used`.
    pub fn sql(&self) -> String {
        format!(
            r"
SELECT
    m.warehouse_id,
    COALESCE(m.warehouse_name, CAST(m.warehouse_id AS VARCHAR)) AS warehouse_name,
    CAST(m.start_time AS VARCHAR) AS start_time,
    CAST(COALESCE(m.credits_used, 0) AS DOUBLE) AS credits_used
FROM {metering_history} m
WHERE m.start_time >= CAST(? AS TIMESTAMP)
    AND m.start_time < CAST(? AS TIMESTAMP)
ORDER BY m.start_time ASC, 2 ASC",
            metering_history = self.tables.metering_history,
        )
    }

    pub fn params(&self) -> [String; 2] {
        [self.range.start_bound(), self.range.end_bound()]
    }
}
