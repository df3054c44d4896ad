//! # whutil Warehouse
//!
//! DuckDB-backed storage for warehouse query and metering history.
//!
//! ## Overview
//!
//! This crate owns the local usage database: it creates the schema, ingests
//! query and metering history (from typed rows or CSV exports), answers the
//! aggregation queries built by `whutil-core`, and lets callers page through
//! its own tables and views.
//!
//! ### Features
//!
//! - **Parameterized SQL**: every user-supplied value is bound, never interpolated
//! - **Shared pool**: pooled connections all see one database instance
//! - **Inspection**: read-only, range-filtered paging over the usage relations
//! - **CSV loading**: `read_csv_auto` import of account usage exports, with the
//!   same credit checks as typed ingestion
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use whutil_core::{run_report, ReportContext};
//! use whutil_warehouse::Warehouse;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let context = ReportContext::parse(
//!         "2024-01-01",
//!         "2024-02-01",
//!         "query_history",
//!         "warehouse_metering_history",
//!     )?;
//!
//!     let report = run_report(&warehouse, &context)?;
//!     println!("{} warehouses", report.summaries.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `query_history` | One row per executed query |
//! | `warehouse_metering_history` | Billed credits per warehouse and hour |
//! | `ingest_log` | Ingestion audit log |
//!
//! ## Views
//!
//! | View | Description |
//! |------|-------------|
//! | `vw_query_hourly` | Query volume and expected credits per warehouse hour |
//! | `vw_metering_daily` | Billed credits per warehouse and day |

pub mod duckdb;
pub mod error;
pub mod inspect;
pub mod migrations;
pub mod source;
pub mod views;

use std::env;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use tracing::{debug, info};
use whutil_core::{DateRange, MeteringFact, QueryFact, ValidationError};

pub use duckdb::{AccessMode, DuckDbConnectionManager, PooledConnection};
pub use error::WarehouseError;
pub use inspect::{RelationColumn, RelationRows, UsageRelation, DEFAULT_INSPECT_LIMIT};

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for whutil data.
    pub whutil_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum idle connections kept per access mode.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::for_home(resolve_whutil_home())
    }
}

impl WarehouseConfig {
    /// Configuration rooted at `whutil_home` with the default file layout.
    pub fn for_home(whutil_home: PathBuf) -> Self {
        let db_path = whutil_home.join("warehouse.duckdb");
        Self {
            whutil_home,
            db_path,
            max_pool_size: 4,
        }
    }

    /// Configuration for an explicit database file.
    pub fn for_db_path(db_path: PathBuf) -> Self {
        Self {
            db_path,
            ..Self::default()
        }
    }
}

/// Usage dataset a load targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    QueryHistory,
    MeteringHistory,
}

impl Dataset {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueryHistory => "query_history",
            Self::MeteringHistory => "metering_history",
        }
    }
}

impl Display for Dataset {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dataset {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "query_history" => Ok(Self::QueryHistory),
            "metering_history" | "metering" => Ok(Self::MeteringHistory),
            other => Err(WarehouseError::QueryRejected(format!(
                "unknown dataset '{other}'"
            ))),
        }
    }
}

/// Outcome of a load into the warehouse.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub dataset: Dataset,
    pub source: String,
    pub rows_loaded: usize,
    pub db_path: PathBuf,
}

/// The usage warehouse.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Initialize database schema and views.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        views::create_views(&connection)?;
        debug!(path = %self.db_path().display(), "warehouse initialized");
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub(crate) fn manager(&self) -> &DuckDbConnectionManager {
        &self.manager
    }

    /// Read up to `limit` rows of a usage table or view, oldest first.
    ///
    /// With a `range`, only rows whose timestamp falls in `[start, end)` are
    /// returned.
    pub fn inspect(
        &self,
        relation: UsageRelation,
        range: Option<&DateRange>,
        limit: usize,
    ) -> Result<RelationRows, WarehouseError> {
        let connection = self.manager.acquire(AccessMode::ReadOnly)?;
        inspect::select_rows(&connection, relation, range, limit)
    }

    /// Append query history rows.
    ///
    /// An elapsed time that does not fit the BIGINT column rejects the whole
    /// batch.
    pub fn ingest_query_history(
        &self,
        source: &str,
        request_id: &str,
        rows: &[QueryFact],
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                let start_time = row.start_time.format();
                let elapsed = i64::try_from(row.total_elapsed_time_ms).map_err(|_| {
                    ValidationError::ValueOutOfRange {
                        field: "total_elapsed_time_ms",
                        value: row.total_elapsed_time_ms.to_string(),
                    }
                })?;
                let params: [&dyn ToSql; 7] = [
                    &row.query_id,
                    &row.warehouse_id,
                    &row.warehouse_name,
                    &row.warehouse_size,
                    &start_time,
                    &row.cluster_number,
                    &elapsed,
                ];
                connection.execute(
                    "INSERT INTO query_history \
                     (query_id, warehouse_id, warehouse_name, warehouse_size, start_time, cluster_number, total_elapsed_time) \
                     VALUES (?, ?, ?, ?, CAST(? AS TIMESTAMP), ?, ?)",
                    params.as_slice(),
                )?;
            }

            log_ingest(&connection, request_id, Dataset::QueryHistory, source, rows.len())?;
            Ok(rows.len())
        })();

        let loaded = finalize_transaction(&connection, result)?;
        info!(dataset = "query_history", source, rows = loaded, "ingested rows");
        Ok(loaded)
    }

    /// Upsert metering rows keyed by warehouse and hour.
    ///
    /// Rows are validated first; a non-finite or negative credit value
    /// rejects the whole batch.
    pub fn ingest_metering(
        &self,
        source: &str,
        request_id: &str,
        rows: &[MeteringFact],
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            row.validate()?;
        }

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            for row in rows {
                let start_time = row.start_time.truncate_to_hour().format();
                let params: [&dyn ToSql; 5] = [
                    &row.warehouse_id,
                    &row.warehouse_name,
                    &start_time,
                    &start_time,
                    &row.credits_used,
                ];
                connection.execute(
                    "INSERT OR REPLACE INTO warehouse_metering_history \
                     (warehouse_id, warehouse_name, start_time, end_time, credits_used) \
                     VALUES (?, ?, CAST(? AS TIMESTAMP), CAST(? AS TIMESTAMP) + INTERVAL 1 HOUR, ?)",
                    params.as_slice(),
                )?;
            }

            log_ingest(&connection, request_id, Dataset::MeteringHistory, source, rows.len())?;
            Ok(rows.len())
        })();

        let loaded = finalize_transaction(&connection, result)?;
        info!(dataset = "metering_history", source, rows = loaded, "ingested rows");
        Ok(loaded)
    }

    /// Load a CSV export into one of the usage tables.
    ///
    /// Column names follow the account usage views (matched
    /// case-insensitively): query history needs `warehouse_id`,
    /// `warehouse_name`, `warehouse_size`, `start_time` and
    /// `total_elapsed_time`, with optional `query_id` and `cluster_number`.
    /// Metering history needs `warehouse_id`, `warehouse_name`, `start_time`
    /// and `credits_used`; a file with any negative or non-finite
    /// `credits_used` is rejected before anything is written.
    pub fn load_csv(
        &self,
        dataset: Dataset,
        path: &Path,
        request_id: &str,
    ) -> Result<LoadReport, WarehouseError> {
        if !path.is_file() {
            return Err(WarehouseError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("CSV file not found: {}", path.display()),
            )));
        }

        let source = path.display().to_string();
        let relation = format!(
            "read_csv_auto('{}', header = true, normalize_names = true)",
            escape_sql_string(source.as_str())
        );

        let connection = self.manager.acquire(AccessMode::ReadWrite)?;
        let columns = csv_columns(&connection, relation.as_str())?;
        let insert = match dataset {
            Dataset::QueryHistory => query_history_insert(relation.as_str(), &columns)?,
            Dataset::MeteringHistory => {
                let insert = metering_insert(relation.as_str(), &columns)?;
                check_metering_credits(&connection, relation.as_str())?;
                insert
            }
        };

        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let loaded = connection.execute(insert.as_str(), [] as [&dyn ToSql; 0])?;
            log_ingest(&connection, request_id, dataset, source.as_str(), loaded)?;
            Ok(loaded)
        })();
        let rows_loaded = finalize_transaction(&connection, result)?;

        info!(%dataset, source = %source, rows = rows_loaded, "loaded csv");
        Ok(LoadReport {
            dataset,
            source,
            rows_loaded,
            db_path: self.db_path().to_path_buf(),
        })
    }
}

fn csv_columns(connection: &Connection, relation: &str) -> Result<Vec<String>, WarehouseError> {
    Ok(inspect::describe(connection, relation)?
        .into_iter()
        .map(|column| column.name.to_ascii_lowercase())
        .collect())
}

/// Apply [`MeteringFact::validate`]'s credit rules to a whole CSV relation.
fn check_metering_credits(connection: &Connection, relation: &str) -> Result<(), WarehouseError> {
    let (non_finite, negative): (i64, i64) = connection.query_row(
        &format!(
            "SELECT count(*) FILTER (WHERE NOT isfinite(credits)), \
                    count(*) FILTER (WHERE credits < 0) \
             FROM (SELECT CAST(credits_used AS DOUBLE) AS credits FROM {relation} \
                   WHERE warehouse_id IS NOT NULL AND start_time IS NOT NULL) metering_rows"
        ),
        [] as [&dyn ToSql; 0],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    if non_finite > 0 {
        return Err(ValidationError::NonFiniteValue {
            field: "credits_used",
        }
        .into());
    }
    if negative > 0 {
        return Err(ValidationError::NegativeValue {
            field: "credits_used",
        }
        .into());
    }
    Ok(())
}

fn require_columns(columns: &[String], required: &[&str]) -> Result<(), WarehouseError> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|name| !columns.iter().any(|column| column == name))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(WarehouseError::QueryRejected(format!(
            "CSV is missing required columns: {}",
            missing.join(", ")
        )))
    }
}

fn optional_column(columns: &[String], name: &str, cast: &str) -> String {
    if columns.iter().any(|column| column == name) {
        format!("CAST({name} AS {cast})")
    } else {
        format!("CAST(NULL AS {cast})")
    }
}

fn query_history_insert(relation: &str, columns: &[String]) -> Result<String, WarehouseError> {
    require_columns(
        columns,
        &[
            "warehouse_id",
            "warehouse_name",
            "warehouse_size",
            "start_time",
            "total_elapsed_time",
        ],
    )?;

    Ok(format!(
        "INSERT INTO query_history \
         (query_id, warehouse_id, warehouse_name, warehouse_size, start_time, cluster_number, total_elapsed_time) \
         SELECT {query_id}, CAST(warehouse_id AS BIGINT), CAST(warehouse_name AS VARCHAR), \
         NULLIF(trim(CAST(warehouse_size AS VARCHAR)), ''), CAST(start_time AS TIMESTAMP), {cluster_number}, \
         CAST(COALESCE(total_elapsed_time, 0) AS BIGINT) \
         FROM {relation} \
         WHERE warehouse_id IS NOT NULL AND start_time IS NOT NULL",
        query_id = optional_column(columns, "query_id", "VARCHAR"),
        cluster_number = optional_column(columns, "cluster_number", "INTEGER"),
    ))
}

fn metering_insert(relation: &str, columns: &[String]) -> Result<String, WarehouseError> {
    require_columns(
        columns,
        &["warehouse_id", "warehouse_name", "start_time", "credits_used"],
    )?;

    // Duplicate warehouse hours collapse so the upsert never sees a key twice.
    Ok(format!(
        "INSERT OR REPLACE INTO warehouse_metering_history \
         (warehouse_id, warehouse_name, start_time, end_time, credits_used) \
         SELECT warehouse_id, MAX(warehouse_name), hour_start, hour_start + INTERVAL 1 HOUR, MAX(credits_used) \
         FROM ( \
             SELECT CAST(warehouse_id AS BIGINT) AS warehouse_id, \
                    CAST(warehouse_name AS VARCHAR) AS warehouse_name, \
                    date_trunc('hour', CAST(start_time AS TIMESTAMP)) AS hour_start, \
                    CAST(COALESCE(credits_used, 0) AS DOUBLE) AS credits_used \
             FROM {relation} \
             WHERE warehouse_id IS NOT NULL AND start_time IS NOT NULL \
         ) metering_rows \
         GROUP BY warehouse_id, hour_start"
    ))
}

fn log_ingest(
    connection: &Connection,
    request_id: &str,
    dataset: Dataset,
    source: &str,
    row_count: usize,
) -> Result<(), WarehouseError> {
    let row_count = i64::try_from(row_count).unwrap_or(i64::MAX);
    let dataset = dataset.as_str();
    let params: [&dyn ToSql; 4] = [&request_id, &dataset, &source, &row_count];
    connection.execute(
        "INSERT INTO ingest_log (request_id, dataset, source, status, row_count, timestamp) \
         VALUES (?, ?, ?, 'ok', ?, CURRENT_TIMESTAMP)",
        params.as_slice(),
    )?;
    Ok(())
}

/// Escape a string for a single-quoted SQL literal.
///
/// Only for file paths handed to table functions, which take no parameters.
fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

/// Resolve the whutil home directory from environment or default.
fn resolve_whutil_home() -> PathBuf {
    if let Some(path) = env::var_os("WHUTIL_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".whutil");
    }

    PathBuf::from(".whutil")
}
