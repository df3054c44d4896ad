//! # whutil Core
//!
//! Domain types and the utilization pipeline for `whutil`.
//!
//! ## Overview
//!
//! Warehouse utilization compares the credits a warehouse *should* have burned,
//! given how long its queries ran and its size, against the credits it was
//! actually billed. This crate holds everything about that comparison that does
//! not touch a database:
//!
//! - **Size table**: [`WarehouseSize`] and its credits-per-hour capacity
//! - **Query builder**: [`UtilizationQuery`] / [`MeteringQuery`] SQL text
//! - **Calculator**: [`calculator::compute`] for per-warehouse and total figures
//! - **Credit views**: [`heatmap`] series and heatmap data
//! - **Pipeline**: [`run_report`] / [`run_metering`] over any [`UsageSource`]
//! - **Envelope**: response wrapper used by the CLI
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`calculator`] | Derived metrics and dashboard totals |
//! | [`domain`] | Sizes, date ranges, timestamps, usage rows |
//! | [`envelope`] | Response envelope with metadata |
//! | [`error`] | Validation and report errors |
//! | [`heatmap`] | Credit series and heatmaps |
//! | [`query`] | SQL builders |
//! | [`report`] | Source trait and report pipeline |
//!
//! ## Data flow
//!
//! ```text
//! DateRange + SourceTables
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ UtilizationQuery│────▶│ UsageSource      │  (DuckDB in whutil-warehouse)
//! └─────────────────┘     └────────┬─────────┘
//!                                  │ Vec<UsageAggregate>
//!                                  ▼
//!                         ┌──────────────────┐
//!                         │ calculator       │
//!                         └────────┬─────────┘
//!                                  ▼
//!                         UtilizationReport
//! ```

pub mod calculator;
pub mod domain;
pub mod envelope;
pub mod error;
pub mod heatmap;
pub mod query;
pub mod report;

pub use calculator::{Anomaly, DashboardTotals, Utilization, WarehouseSummary};
pub use domain::*;
pub use envelope::{Envelope, EnvelopeError, EnvelopeMeta};
pub use error::{ReportError, ValidationError};
pub use heatmap::{CreditHeatmap, CreditSeries, HeatmapCell, SeriesPoint, WarehouseHourCell};
pub use query::{capacity_case_expression, MeteringQuery, UtilizationQuery};
pub use report::{
    run_metering, run_report, MeteringReport, ReportContext, UsageSource, UtilizationReport,
};
