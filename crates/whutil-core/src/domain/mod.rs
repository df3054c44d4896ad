//! # Domain Models
//!
//! Usage facts, warehouse sizes, and the report window.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`WarehouseSize`] | Size tier with its credits-per-hour capacity |
//! | [`DateRange`] | Validated `[start, end)` calendar window |
//! | [`UsageTimestamp`] | Offset-free timestamp as stored by the usage views |
//! | [`QueryFact`] | One query log row |
//! | [`MeteringFact`] | One metering row (credits for one warehouse-hour) |
//! | [`UsageAggregate`] | Per warehouse/size row returned by the utilization query |
//! | [`SourceTables`] | Query log and metering table references |

mod date_range;
mod models;
mod size;
mod timestamp;

pub use date_range::{parse_date, DateRange};
pub use models::{MeteringFact, QueryFact, SourceTables, TableRef, UsageAggregate};
pub use size::{capacity_for_label, WarehouseSize};
pub use timestamp::UsageTimestamp;
