//! Report pipeline: context in, report out.
//!
//! The pipeline never holds session state of its own. Everything a run needs
//! arrives in a [`ReportContext`] and the [`UsageSource`] the caller passes in,
//! so the same run can be driven from the CLI, from tests with a canned source,
//! or from any other front end.
//!
//! ```rust,ignore
//! use whutil_core::{run_report, DateRange, ReportContext, SourceTables};
//!
//! let context = ReportContext::new(DateRange::parse("2024-01-01", "2024-02-01")?, SourceTables::default());
//! let report = run_report(&warehouse, &context)?;
//! println!("overall utilization: {:?}", report.totals.utilization);
//! ```

use std::error::Error;

use serde::Serialize;
use tracing::debug;

use crate::calculator::{self, Anomaly, DashboardTotals, WarehouseSummary};
use crate::heatmap::{credit_heatmap, credit_series, CreditHeatmap, CreditSeries};
use crate::query::{MeteringQuery, UtilizationQuery};
use crate::{DateRange, MeteringFact, ReportError, SourceTables, UsageAggregate};

/// Anything that can answer the two usage queries.
pub trait UsageSource {
    type Error: Error + Send + Sync + 'static;

    /// Run the utilization aggregation and return its rows.
    fn aggregate_usage(&self, query: &UtilizationQuery) -> Result<Vec<UsageAggregate>, Self::Error>;

    /// Scan metering rows inside the query's range.
    fn metering_history(&self, query: &MeteringQuery) -> Result<Vec<MeteringFact>, Self::Error>;
}

/// Inputs for one report run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportContext {
    pub range: DateRange,
    pub tables: SourceTables,
}

impl ReportContext {
    pub fn new(range: DateRange, tables: SourceTables) -> Self {
        Self { range, tables }
    }

    /// Validate raw date text and table names before anything is queried.
    pub fn parse(
        start: &str,
        end: &str,
        query_history: &str,
        metering_history: &str,
    ) -> Result<Self, ReportError> {
        let range = DateRange::parse(start, end)?;
        let tables = SourceTables::new(query_history, metering_history)?;
        Ok(Self::new(range, tables))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UtilizationReport {
    pub range: DateRange,
    pub summaries: Vec<WarehouseSummary>,
    pub totals: DashboardTotals,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<Anomaly>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeteringReport {
    pub range: DateRange,
    pub series: CreditSeries,
    pub heatmap: CreditHeatmap,
}

/// Query the source once and derive utilization for the context's range.
pub fn run_report<S>(source: &S, context: &ReportContext) -> Result<UtilizationReport, ReportError>
where
    S: UsageSource + ?Sized,
{
    let query = UtilizationQuery::new(context.range, context.tables.clone());
    debug!(range = %context.range, "running utilization query");
    let rows = source
        .aggregate_usage(&query)
        .map_err(ReportError::execution)?;
    debug!(rows = rows.len(), "utilization query returned");

    let utilization = calculator::compute(rows);
    Ok(UtilizationReport {
        range: context.range,
        summaries: utilization.summaries,
        totals: utilization.totals,
        anomalies: utilization.anomalies,
    })
}

/// Scan metering for the context's range and build the credit views.
pub fn run_metering<S>(source: &S, context: &ReportContext) -> Result<MeteringReport, ReportError>
where
    S: UsageSource + ?Sized,
{
    let query = MeteringQuery::new(context.range, context.tables.clone());
    let facts = source
        .metering_history(&query)
        .map_err(ReportError::execution)?;
    debug!(rows = facts.len(), range = %context.range, "metering scan returned");

    Ok(MeteringReport {
        range: context.range,
        series: credit_series(&facts),
        heatmap: credit_heatmap(&facts),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::fmt::{Display, Formatter};

    use super::*;
    use crate::{UsageTimestamp, ValidationError};

    #[derive(Debug)]
    struct Offline;

    impl Display for Offline {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            f.write_str("connection refused")
        }
    }

    impl Error for Offline {}

    struct CannedSource {
        rows: Vec<UsageAggregate>,
        facts: Vec<MeteringFact>,
        fail: bool,
        calls: Cell<usize>,
    }

    impl CannedSource {
        fn new(rows: Vec<UsageAggregate>) -> Self {
            Self {
                rows,
                facts: Vec::new(),
                fail: false,
                calls: Cell::new(0),
            }
        }
    }

    impl UsageSource for CannedSource {
        type Error = Offline;

        fn aggregate_usage(&self, _query: &UtilizationQuery) -> Result<Vec<UsageAggregate>, Offline> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(Offline);
            }
            Ok(self.rows.clone())
        }

        fn metering_history(&self, query: &MeteringQuery) -> Result<Vec<MeteringFact>, Offline> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(Offline);
            }
            Ok(self
                .facts
                .iter()
                .filter(|fact| query.range().contains(fact.start_time.into_inner()))
                .cloned()
                .collect())
        }
    }

    fn context() -> ReportContext {
        ReportContext::parse("2024-01-01", "2024-02-01", "query_history", "warehouse_metering_history")
            .expect("context")
    }

    #[test]
    fn report_carries_summaries_and_totals() {
        let source = CannedSource::new(vec![UsageAggregate {
            warehouse_name: String::from("WH1"),
            warehouse_size: Some(String::from("Small")),
            num_queries: Some(100),
            total_elapsed_time_ms: Some(360_000_000.0),
            expected_credits: Some(200.0),
            actual_credits: Some(250.0),
        }]);

        let report = run_report(&source, &context()).expect("report");
        assert_eq!(report.summaries.len(), 1);
        assert_eq!(report.totals.num_queries, 100);
        assert!((report.totals.utilization.expect("ratio") - 0.8).abs() < 1e-9);
        assert_eq!(source.calls.get(), 1);
    }

    #[test]
    fn equal_dates_are_rejected_before_querying() {
        let err = ReportContext::parse("2024-01-01", "2024-01-01", "query_history", "metering")
            .expect_err("must fail");
        assert!(matches!(
            err,
            ReportError::Validation(ValidationError::EmptyDateRange { .. })
        ));
    }

    #[test]
    fn source_failures_surface_as_execution_errors() {
        let mut source = CannedSource::new(Vec::new());
        source.fail = true;

        let err = run_report(&source, &context()).expect_err("must fail");
        assert!(matches!(err, ReportError::Execution(_)));
        assert_eq!(err.to_string(), "query execution failed: connection refused");
    }

    #[test]
    fn metering_report_builds_series_and_heatmap() {
        let mut source = CannedSource::new(Vec::new());
        source.facts = vec![
            MeteringFact {
                warehouse_id: 7,
                warehouse_name: String::from("ETL"),
                start_time: UsageTimestamp::parse("2024-01-15 03:00:00").expect("ts"),
                credits_used: 4.0,
            },
            MeteringFact {
                warehouse_id: 7,
                warehouse_name: String::from("ETL"),
                start_time: UsageTimestamp::parse("2024-02-01 00:00:00").expect("ts"),
                credits_used: 9.0,
            },
        ];

        let report = run_metering(&source, &context()).expect("metering");
        assert_eq!(report.series.points.len(), 1);
        assert_eq!(report.series.total_credits, 4.0);
        assert_eq!(report.heatmap.max_credits, 4.0);
    }
}
