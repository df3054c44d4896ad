//! [`UsageSource`] over the local warehouse.

use ::duckdb::ToSql;
use tracing::debug;
use whutil_core::{MeteringFact, MeteringQuery, UsageAggregate, UsageSource, UsageTimestamp, UtilizationQuery};

use crate::{AccessMode, Warehouse, WarehouseError};

impl UsageSource for Warehouse {
    type Error = WarehouseError;

    fn aggregate_usage(&self, query: &UtilizationQuery) -> Result<Vec<UsageAggregate>, Self::Error> {
        let sql = query.sql();
        let [start, end] = query.params();
        debug!(range = %query.range(), "running utilization aggregate");

        let connection = self.manager().acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(sql.as_str())?;
        let params: [&dyn ToSql; 2] = [&start, &end];
        let rows = statement
            .query_map(params.as_slice(), |row| {
                Ok(UsageAggregate {
                    warehouse_name: row.get(0)?,
                    warehouse_size: row.get(1)?,
                    num_queries: row.get(2)?,
                    total_elapsed_time_ms: row.get(3)?,
                    expected_credits: row.get(4)?,
                    actual_credits: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        debug!(rows = rows.len(), "utilization aggregate returned");
        Ok(rows)
    }

    fn metering_history(&self, query: &MeteringQuery) -> Result<Vec<MeteringFact>, Self::Error> {
        let sql = query.sql();
        let [start, end] = query.params();
        debug!(range = %query.range(), "reading metering history");

        let connection = self.manager().acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(sql.as_str())?;
        let params: [&dyn ToSql; 2] = [&start, &end];
        let raw = statement
            .query_map(params.as_slice(), |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(warehouse_id, warehouse_name, start_time, credits_used)| -> Result<_, WarehouseError> {
                Ok(MeteringFact {
                    warehouse_id,
                    warehouse_name,
                    start_time: UsageTimestamp::parse(start_time.as_str())?,
                    credits_used,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use whutil_core::{DateRange, QueryFact, SourceTables};

    use super::*;
    use crate::WarehouseConfig;

    fn ts(value: &str) -> UsageTimestamp {
        UsageTimestamp::parse(value).expect("timestamp")
    }

    fn query(warehouse_id: i64, name: &str, size: &str, start: &str, elapsed_ms: u64) -> QueryFact {
        QueryFact {
            query_id: None,
            warehouse_id,
            warehouse_name: name.to_owned(),
            warehouse_size: Some(size.to_owned()),
            start_time: ts(start),
            cluster_number: Some(1),
            total_elapsed_time_ms: elapsed_ms,
        }
    }

    fn range(start: &str, end: &str) -> DateRange {
        DateRange::parse(start, end).expect("range")
    }

    #[test]
    fn aggregates_join_metering_by_warehouse_hour() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::for_home(temp.path().to_path_buf()))
            .expect("warehouse");

        warehouse
            .ingest_query_history(
                "test",
                "req-1",
                &[
                    query(1, "WH1", "Small", "2024-01-01 10:05:00", 1_800_000),
                    query(1, "WH1", "Small", "2024-01-01 10:40:00", 1_800_000),
                ],
            )
            .expect("queries");
        warehouse
            .ingest_metering(
                "test",
                "req-1",
                &[MeteringFact {
                    warehouse_id: 1,
                    warehouse_name: String::from("WH1"),
                    start_time: ts("2024-01-01 10:00:00"),
                    credits_used: 1.0,
                }],
            )
            .expect("metering");

        let rows = warehouse
            .aggregate_usage(&UtilizationQuery::new(
                range("2024-01-01", "2024-01-02"),
                SourceTables::default(),
            ))
            .expect("aggregate");

        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.warehouse_name, "WH1");
        assert_eq!(row.warehouse_size.as_deref(), Some("Small"));
        assert_eq!(row.num_queries, Some(2));
        assert_eq!(row.total_elapsed_time_ms, Some(3_600_000.0));
        assert_eq!(row.expected_credits, Some(2.0));
        assert_eq!(row.actual_credits, Some(1.0));
    }

    #[test]
    fn unmetered_hours_report_null_actual_credits() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::for_home(temp.path().to_path_buf()))
            .expect("warehouse");
        warehouse
            .ingest_query_history(
                "test",
                "req-1",
                &[query(3, "WH3", "X-Small", "2024-01-01 09:00:00", 60_000)],
            )
            .expect("queries");

        let rows = warehouse
            .aggregate_usage(&UtilizationQuery::new(
                range("2024-01-01", "2024-01-02"),
                SourceTables::default(),
            ))
            .expect("aggregate");

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].actual_credits, None);
    }

    #[test]
    fn metering_history_reads_typed_rows_in_range() {
        let temp = tempdir().expect("tempdir");
        let warehouse = Warehouse::open(WarehouseConfig::for_home(temp.path().to_path_buf()))
            .expect("warehouse");
        let fact = |start: &str, credits: f64| MeteringFact {
            warehouse_id: 2,
            warehouse_name: String::from("WH2"),
            start_time: ts(start),
            credits_used: credits,
        };
        warehouse
            .ingest_metering(
                "test",
                "req-1",
                &[
                    fact("2024-01-01 23:00:00", 4.0),
                    fact("2024-01-02 00:00:00", 8.0),
                ],
            )
            .expect("metering");

        let rows = warehouse
            .metering_history(&MeteringQuery::new(
                range("2024-01-01", "2024-01-02"),
                SourceTables::default(),
            ))
            .expect("metering history");

        assert_eq!(rows, vec![fact("2024-01-01 23:00:00", 4.0)]);
    }
}
