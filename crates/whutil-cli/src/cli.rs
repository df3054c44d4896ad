//! CLI argument definitions for whutil.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `report` | Utilization per warehouse for a date range |
//! | `metering` | Billed credit series and weekday/hour heatmap |
//! | `sizes` | Warehouse size capacity table |
//! | `load` | Import query or metering history CSV exports |
//! | `inspect` | Page through the warehouse's usage tables and views |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, ndjson, table) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--strict` | `false` | Treat warnings as errors |
//! | `--db` | `$WHUTIL_HOME/warehouse.duckdb` | Warehouse database file |
//!
//! # Examples
//!
//! ```bash
//! whutil load query-history query_history.csv
//! whutil load metering warehouse_metering_history.csv
//! whutil report --start 2024-01-01 --end 2024-02-01 --pretty
//! whutil report --start 2024-01-01 --end 2024-02-01 --strict
//! whutil inspect query-hourly --start 2024-01-01 --end 2024-01-02 --format table
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use whutil_warehouse::DEFAULT_INSPECT_LIMIT;

/// whutil - warehouse utilization reports
///
/// Compares the credits each warehouse's queries should have consumed with
/// the credits it was billed, using a local DuckDB copy of query and
/// metering history.
#[derive(Debug, Parser)]
#[command(
    name = "whutil",
    author,
    version,
    about = "Warehouse utilization reports over query and metering history"
)]
pub struct Cli {
    /// Output format for results.
    ///
    /// - json: Single JSON object (default)
    /// - ndjson: One JSON object per line
    /// - table: Plain text for terminals
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Treat warnings (such as excluded anomaly rows) as failures (exit code 5).
    #[arg(long, global = true, default_value_t = false)]
    pub strict: bool,

    /// Warehouse database file. Defaults to `$WHUTIL_HOME/warehouse.duckdb`.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text for terminal display.
    Table,
    /// Single JSON object output.
    Json,
    /// Newline-delimited JSON (one object per line).
    Ndjson,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute utilization per warehouse and size.
    ///
    /// The range is half-open: `--start` is included, `--end` is not.
    ///
    /// # Examples
    ///
    ///   whutil report --start 2024-01-01 --end 2024-01-08
    ///   whutil report --start 2024-01-01 --end 2024-02-01 --query-table snowflake.account_usage.query_history
    Report(ReportArgs),

    /// Billed credits over time and by weekday/hour.
    ///
    /// # Examples
    ///
    ///   whutil metering --start 2024-01-01 --end 2024-01-08 --format table
    Metering(MeteringArgs),

    /// Print the warehouse size to credits-per-hour table.
    Sizes,

    /// Load CSV exports into the warehouse.
    Load(LoadArgs),

    /// Show rows of a usage table or view, oldest first.
    ///
    /// Relations: query-history, metering, ingest-log, query-hourly,
    /// metering-daily. Read-only.
    ///
    /// # Examples
    ///
    ///   whutil inspect metering-daily --start 2024-01-01 --end 2024-02-01
    ///   whutil inspect ingest-log --limit 10
    Inspect(InspectArgs),
}

/// Date range shared by the reporting commands.
#[derive(Debug, Args)]
pub struct RangeArgs {
    /// First day included, `YYYY-MM-DD`.
    #[arg(long)]
    pub start: String,

    /// First day excluded, `YYYY-MM-DD`.
    #[arg(long)]
    pub end: String,
}

/// Arguments for the `report` command.
#[derive(Debug, Args)]
pub struct ReportArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Query history table (`[db.][schema.]table`).
    #[arg(long, default_value = "query_history")]
    pub query_table: String,

    /// Metering history table (`[db.][schema.]table`).
    #[arg(long, default_value = "warehouse_metering_history")]
    pub metering_table: String,
}

/// Arguments for the `metering` command.
#[derive(Debug, Args)]
pub struct MeteringArgs {
    #[command(flatten)]
    pub range: RangeArgs,

    /// Metering history table (`[db.][schema.]table`).
    #[arg(long, default_value = "warehouse_metering_history")]
    pub metering_table: String,
}

/// Arguments for the `load` command group.
#[derive(Debug, Args)]
pub struct LoadArgs {
    #[command(subcommand)]
    pub command: LoadCommand,
}

/// Load subcommands.
#[derive(Debug, Subcommand)]
pub enum LoadCommand {
    /// Append a query history export.
    ///
    /// Required columns: warehouse_id, warehouse_name, warehouse_size,
    /// start_time, total_elapsed_time. Optional: query_id, cluster_number.
    QueryHistory(LoadFileArgs),

    /// Upsert a warehouse metering history export.
    ///
    /// Required columns: warehouse_id, warehouse_name, start_time, credits_used.
    Metering(LoadFileArgs),
}

/// CSV file to load.
#[derive(Debug, Args)]
pub struct LoadFileArgs {
    /// Path to a CSV file with a header row.
    pub path: PathBuf,
}

/// Arguments for the `inspect` command.
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Relation to read.
    pub relation: String,

    /// First day included, `YYYY-MM-DD`.
    #[arg(long, requires = "end")]
    pub start: Option<String>,

    /// First day excluded, `YYYY-MM-DD`.
    #[arg(long, requires = "start")]
    pub end: Option<String>,

    /// Maximum number of rows to return.
    #[arg(long, default_value_t = DEFAULT_INSPECT_LIMIT)]
    pub limit: usize,
}
