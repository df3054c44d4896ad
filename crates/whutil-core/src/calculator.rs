//! Derived utilization metrics.
//!
//! Turns [`UsageAggregate`] rows into [`WarehouseSummary`] rows plus
//! [`DashboardTotals`]. Rows that cannot yield a meaningful ratio are dropped:
//! zero actual credits silently (nothing was billed); negative or non-finite
//! credits, an unknown size or a zero query count with an [`Anomaly`] so the
//! caller can surface it.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

use serde::Serialize;
use tracing::{debug, warn};

use crate::query::MS_PER_HOUR;
use crate::{capacity_for_label, UsageAggregate, WarehouseSize};

const MS_PER_SECOND: f64 = 1_000.0;
const MS_PER_MINUTE: f64 = 60_000.0;

/// Utilization figures for one warehouse at one size.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WarehouseSummary {
    pub warehouse_name: String,
    pub warehouse_size: WarehouseSize,
    pub num_queries: u64,
    pub total_elapsed_time_ms: f64,
    pub expected_credits: f64,
    pub actual_credits: f64,
    /// `expected_credits / actual_credits`; above 1.0 under concurrent load.
    pub utilization: f64,
    pub total_query_s: f64,
    pub total_query_min: f64,
    pub total_query_hrs: f64,
    pub avg_query_time_ms: f64,
    pub avg_query_time_s: f64,
    pub avg_credits_per_query: f64,
    /// Credits per hour for `warehouse_size`.
    pub warehouse_cph: u32,
    pub total_wh_hrs: f64,
    pub total_wh_min: f64,
    pub total_wh_s: f64,
}

/// Report-level figures across every surviving summary row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardTotals {
    pub num_queries: u64,
    pub total_query_hrs: f64,
    /// Mean of the per-row average query time.
    pub avg_query_time_s: f64,
    pub expected_credits: f64,
    pub actual_credits: f64,
    /// `Σ expected / Σ actual`, or `None` when no row survived.
    pub utilization: Option<f64>,
}

/// A row excluded for data-integrity reasons.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    /// Billed credits below zero, NaN or infinite.
    InvalidCredits {
        warehouse_name: String,
        warehouse_size: Option<String>,
        actual_credits: f64,
    },
    UnknownSize {
        warehouse_name: String,
        warehouse_size: Option<String>,
    },
    NoQueries {
        warehouse_name: String,
        warehouse_size: String,
    },
}

impl Display for Anomaly {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredits {
                warehouse_name,
                warehouse_size,
                actual_credits,
            } => write!(
                f,
                "warehouse '{warehouse_name}' ({}) reported invalid actual credits {actual_credits}; row excluded",
                warehouse_size.as_deref().unwrap_or("<null>")
            ),
            Self::UnknownSize {
                warehouse_name,
                warehouse_size,
            } => write!(
                f,
                "warehouse '{warehouse_name}' has unmapped size '{}'; row excluded",
                warehouse_size.as_deref().unwrap_or("<null>")
            ),
            Self::NoQueries {
                warehouse_name,
                warehouse_size,
            } => write!(
                f,
                "warehouse '{warehouse_name}' ({warehouse_size}) billed credits with zero queries; row excluded"
            ),
        }
    }
}

/// Output of [`compute`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Utilization {
    /// Sorted by utilization, highest first.
    pub summaries: Vec<WarehouseSummary>,
    pub totals: DashboardTotals,
    pub anomalies: Vec<Anomaly>,
}

/// Derive summaries and totals from aggregated usage rows.
pub fn compute(rows: Vec<UsageAggregate>) -> Utilization {
    let input_rows = rows.len();
    let mut summaries = Vec::with_capacity(rows.len());
    let mut anomalies = Vec::new();

    for row in rows {
        let num_queries = row.num_queries.unwrap_or(0);
        let total_elapsed_time_ms = row.total_elapsed_time_ms.unwrap_or(0.0);
        let expected_credits = row.expected_credits.unwrap_or(0.0);
        let actual_credits = row.actual_credits.unwrap_or(0.0);

        if actual_credits == 0.0 {
            debug!(warehouse = %row.warehouse_name, "no billed credits in range; row dropped");
            continue;
        }
        if !(actual_credits > 0.0 && actual_credits.is_finite()) {
            let anomaly = Anomaly::InvalidCredits {
                warehouse_name: row.warehouse_name,
                warehouse_size: row.warehouse_size,
                actual_credits,
            };
            warn!("{anomaly}");
            anomalies.push(anomaly);
            continue;
        }

        let warehouse_cph = capacity_for_label(row.warehouse_size.as_deref());
        let size = row.warehouse_size.as_deref().and_then(WarehouseSize::from_label);
        let Some(warehouse_size) = size.filter(|_| warehouse_cph > 0) else {
            let anomaly = Anomaly::UnknownSize {
                warehouse_name: row.warehouse_name,
                warehouse_size: row.warehouse_size,
            };
            warn!("{anomaly}");
            anomalies.push(anomaly);
            continue;
        };

        let num_queries = match u64::try_from(num_queries) {
            Ok(count) if count > 0 => count,
            _ => {
                let anomaly = Anomaly::NoQueries {
                    warehouse_name: row.warehouse_name,
                    warehouse_size: warehouse_size.as_str().to_owned(),
                };
                warn!("{anomaly}");
                anomalies.push(anomaly);
                continue;
            }
        };

        let avg_query_time_ms = total_elapsed_time_ms / num_queries as f64;
        let total_wh_hrs = actual_credits / f64::from(warehouse_cph);
        let total_wh_min = total_wh_hrs * 60.0;

        summaries.push(WarehouseSummary {
            warehouse_name: row.warehouse_name,
            warehouse_size,
            num_queries,
            total_elapsed_time_ms,
            expected_credits,
            actual_credits,
            utilization: expected_credits / actual_credits,
            total_query_s: total_elapsed_time_ms / MS_PER_SECOND,
            total_query_min: total_elapsed_time_ms / MS_PER_MINUTE,
            total_query_hrs: total_elapsed_time_ms / MS_PER_HOUR,
            avg_query_time_ms,
            avg_query_time_s: avg_query_time_ms / MS_PER_SECOND,
            avg_credits_per_query: actual_credits / num_queries as f64,
            warehouse_cph,
            total_wh_hrs,
            total_wh_min,
            total_wh_s: total_wh_min * 60.0,
        });
    }

    summaries.sort_by(compare_for_display);
    let totals = totals(&summaries);
    debug!(
        input_rows,
        summaries = summaries.len(),
        anomalies = anomalies.len(),
        "computed utilization"
    );

    Utilization {
        summaries,
        totals,
        anomalies,
    }
}

/// Aggregate figures over summary rows.
pub fn totals(summaries: &[WarehouseSummary]) -> DashboardTotals {
    if summaries.is_empty() {
        return DashboardTotals::default();
    }

    let expected_credits = summaries.iter().map(|row| row.expected_credits).sum::<f64>();
    let actual_credits = summaries.iter().map(|row| row.actual_credits).sum::<f64>();
    let avg_query_time_s = summaries
        .iter()
        .map(|row| row.avg_query_time_s)
        .sum::<f64>()
        / summaries.len() as f64;

    DashboardTotals {
        num_queries: summaries.iter().map(|row| row.num_queries).sum(),
        total_query_hrs: summaries.iter().map(|row| row.total_query_hrs).sum(),
        avg_query_time_s,
        expected_credits,
        actual_credits,
        utilization: (actual_credits > 0.0).then(|| expected_credits / actual_credits),
    }
}

fn compare_for_display(left: &WarehouseSummary, right: &WarehouseSummary) -> Ordering {
    right
        .utilization
        .total_cmp(&left.utilization)
        .then_with(|| left.warehouse_name.cmp(&right.warehouse_name))
        .then_with(|| left.warehouse_size.cmp(&right.warehouse_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn row(
        name: &str,
        size: Option<&str>,
        queries: Option<i64>,
        elapsed_ms: Option<f64>,
        expected: Option<f64>,
        actual: Option<f64>,
    ) -> UsageAggregate {
        UsageAggregate {
            warehouse_name: name.to_owned(),
            warehouse_size: size.map(str::to_owned),
            num_queries: queries,
            total_elapsed_time_ms: elapsed_ms,
            expected_credits: expected,
            actual_credits: actual,
        }
    }

    #[test]
    fn small_warehouse_at_eighty_percent() {
        let result = compute(vec![row(
            "WH1",
            Some("Small"),
            Some(100),
            Some(360_000_000.0),
            Some(200.0),
            Some(250.0),
        )]);

        assert!(result.anomalies.is_empty());
        let summary = &result.summaries[0];
        assert_eq!(summary.warehouse_cph, 2);
        assert!((summary.utilization - 0.8).abs() < TOLERANCE);
        assert!((summary.total_wh_hrs - 125.0).abs() < TOLERANCE);
        assert!((summary.total_wh_min - 7_500.0).abs() < TOLERANCE);
        assert!((summary.total_wh_s - 450_000.0).abs() < TOLERANCE);
        assert!((summary.total_query_hrs - 100.0).abs() < TOLERANCE);
        assert!((summary.total_query_min - 6_000.0).abs() < TOLERANCE);
        assert!((summary.total_query_s - 360_000.0).abs() < TOLERANCE);
        assert!((summary.avg_query_time_ms - 3_600_000.0).abs() < TOLERANCE);
        assert!((summary.avg_query_time_s - 3_600.0).abs() < TOLERANCE);
        assert!((summary.avg_credits_per_query - 2.5).abs() < TOLERANCE);
    }

    #[test]
    fn zero_or_missing_actual_credits_never_survive() {
        let result = compute(vec![
            row("IDLE", Some("Large"), Some(5), Some(1_000.0), Some(999.0), Some(0.0)),
            row("UNMETERED", Some("Large"), Some(5), Some(1_000.0), Some(3.0), None),
            row("BILLED", Some("Large"), Some(5), Some(1_000.0), Some(3.0), Some(4.0)),
        ]);

        assert_eq!(result.summaries.len(), 1);
        assert_eq!(result.summaries[0].warehouse_name, "BILLED");
        assert!(result.summaries.iter().all(|summary| summary.actual_credits > 0.0));
        assert!(result.anomalies.is_empty());
    }

    #[test]
    fn negative_or_non_finite_actual_credits_are_excluded_with_anomaly() {
        let result = compute(vec![
            row("REFUND", Some("Small"), Some(1), Some(1_000.0), Some(1.0), Some(-4.0)),
            row("GARBLED", Some("Small"), Some(1), Some(1_000.0), Some(1.0), Some(f64::NAN)),
            row("OVERFLOW", Some("Small"), Some(1), Some(1_000.0), Some(1.0), Some(f64::INFINITY)),
            row("BILLED", Some("Small"), Some(1), Some(1_000.0), Some(1.0), Some(2.0)),
        ]);

        assert_eq!(result.summaries.len(), 1);
        assert!(result.summaries.iter().all(|summary| summary.actual_credits > 0.0));
        assert!((result.totals.utilization.expect("ratio") - 0.5).abs() < TOLERANCE);

        let flagged = result
            .anomalies
            .iter()
            .map(|anomaly| match anomaly {
                Anomaly::InvalidCredits { warehouse_name, .. } => warehouse_name.as_str(),
                other => panic!("unexpected anomaly: {other}"),
            })
            .collect::<Vec<_>>();
        assert_eq!(flagged, vec!["REFUND", "GARBLED", "OVERFLOW"]);
        assert!(result.anomalies[0].to_string().contains("invalid actual credits -4"));
    }

    #[test]
    fn utilization_is_ratio_of_credits_for_every_row() {
        let result = compute(vec![
            row("A", Some("X-Small"), Some(3), Some(10.0), Some(0.3), Some(0.7)),
            row("B", Some("6X-Large"), Some(9), Some(20.0), Some(1_024.0), Some(512.0)),
            row("C", Some("Medium"), Some(1), Some(30.0), None, Some(12.0)),
        ]);

        for summary in &result.summaries {
            let expected = summary.expected_credits / summary.actual_credits;
            assert!((summary.utilization - expected).abs() < TOLERANCE);
        }
    }

    #[test]
    fn overall_utilization_is_weighted_not_mean_of_rows() {
        let result = compute(vec![
            row("BIG", Some("Large"), Some(10), Some(1.0), Some(90.0), Some(100.0)),
            row("TINY", Some("Small"), Some(10), Some(1.0), Some(1.0), Some(10.0)),
        ]);

        let overall = result.totals.utilization.expect("rows survived");
        assert!((overall - 91.0 / 110.0).abs() < TOLERANCE);

        let mean = result
            .summaries
            .iter()
            .map(|summary| summary.utilization)
            .sum::<f64>()
            / result.summaries.len() as f64;
        assert!((mean - 0.5).abs() < TOLERANCE);
        assert!((overall - mean).abs() > 0.1);
    }

    #[test]
    fn warehouse_hours_times_capacity_reproduce_actual_credits() {
        let result = compute(vec![
            row("WH", Some("Small"), Some(4), Some(1.0), Some(1.0), Some(6.0)),
            row("WH", Some("Large"), Some(4), Some(1.0), Some(1.0), Some(40.0)),
            row("OTHER", Some("Medium"), Some(4), Some(1.0), Some(1.0), Some(7.5)),
        ]);

        let rebuilt = result
            .summaries
            .iter()
            .filter(|summary| summary.warehouse_name == "WH")
            .map(|summary| summary.total_wh_hrs * f64::from(summary.warehouse_size.credits_per_hour()))
            .sum::<f64>();
        assert!((rebuilt - 46.0).abs() < TOLERANCE);
    }

    #[test]
    fn unknown_size_is_excluded_with_anomaly() {
        let result = compute(vec![
            row("ODD", Some("Jumbo"), Some(2), Some(1.0), Some(1.0), Some(1.0)),
            row("NULL", None, Some(2), Some(1.0), Some(1.0), Some(1.0)),
        ]);

        assert!(result.summaries.is_empty());
        assert_eq!(result.anomalies.len(), 2);
        assert!(matches!(
            &result.anomalies[0],
            Anomaly::UnknownSize { warehouse_size: Some(size), .. } if size == "Jumbo"
        ));
        assert_eq!(result.totals, DashboardTotals::default());
    }

    #[test]
    fn zero_query_rows_are_excluded_instead_of_dividing_by_zero() {
        let result = compute(vec![
            row("GHOST", Some("Small"), Some(0), Some(0.0), Some(0.0), Some(5.0)),
            row("NULLQ", Some("Small"), None, None, None, Some(5.0)),
        ]);

        assert!(result.summaries.is_empty());
        assert_eq!(
            result.anomalies[0],
            Anomaly::NoQueries {
                warehouse_name: String::from("GHOST"),
                warehouse_size: String::from("Small"),
            }
        );
        assert!(result.anomalies[0].to_string().contains("zero queries"));
        assert_eq!(result.anomalies.len(), 2);
    }

    #[test]
    fn summaries_sort_by_utilization_descending() {
        let result = compute(vec![
            row("LOW", Some("Small"), Some(1), Some(1.0), Some(1.0), Some(10.0)),
            row("HIGH", Some("Small"), Some(1), Some(1.0), Some(15.0), Some(10.0)),
            row("MID", Some("Small"), Some(1), Some(1.0), Some(5.0), Some(10.0)),
        ]);

        let names = result
            .summaries
            .iter()
            .map(|summary| summary.warehouse_name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["HIGH", "MID", "LOW"]);
    }

    #[test]
    fn totals_sum_and_average_surviving_rows() {
        let result = compute(vec![
            row("A", Some("Small"), Some(2), Some(7_200_000.0), Some(4.0), Some(8.0)),
            row("B", Some("Medium"), Some(4), Some(3_600_000.0), Some(4.0), Some(2.0)),
        ]);

        let totals = &result.totals;
        assert_eq!(totals.num_queries, 6);
        assert!((totals.total_query_hrs - 3.0).abs() < TOLERANCE);
        // A averages 3600 s per query, B 900 s.
        assert!((totals.avg_query_time_s - 2_250.0).abs() < TOLERANCE);
        assert!((totals.expected_credits - 8.0).abs() < TOLERANCE);
        assert!((totals.actual_credits - 10.0).abs() < TOLERANCE);
        assert!((totals.utilization.expect("ratio") - 0.8).abs() < TOLERANCE);
    }
}
