//! Versioned schema for the usage warehouse.

use ::duckdb::Connection;
use tracing::debug;

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_usage_tables",
        sql: r"
CREATE TABLE IF NOT EXISTS query_history (
    query_id TEXT,
    warehouse_id BIGINT NOT NULL,
    warehouse_name TEXT NOT NULL,
    warehouse_size TEXT,
    start_time TIMESTAMP NOT NULL,
    cluster_number INTEGER,
    total_elapsed_time BIGINT NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS warehouse_metering_history (
    warehouse_id BIGINT NOT NULL,
    warehouse_name TEXT,
    start_time TIMESTAMP NOT NULL,
    end_time TIMESTAMP,
    credits_used DOUBLE NOT NULL,
    PRIMARY KEY(warehouse_id, start_time)
);

CREATE TABLE IF NOT EXISTS ingest_log (
    request_id TEXT NOT NULL,
    dataset TEXT NOT NULL,
    source TEXT NOT NULL,
    status TEXT NOT NULL,
    row_count BIGINT,
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
",
    },
    Migration {
        version: "0002_indexes",
        sql: r"
CREATE INDEX IF NOT EXISTS idx_query_history_start_time ON query_history(start_time);
CREATE INDEX IF NOT EXISTS idx_query_history_warehouse_start ON query_history(warehouse_id, start_time);
CREATE INDEX IF NOT EXISTS idx_ingest_log_dataset_ts ON ingest_log(dataset, timestamp);
",
    },
];

pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
",
    )?;

    for migration in MIGRATIONS {
        let applied_count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            [migration.version],
            |row| row.get(0),
        )?;

        if applied_count == 0 {
            debug!(version = migration.version, "applying migration");
            connection.execute_batch(migration.sql)?;
            connection.execute(
                "INSERT INTO schema_migrations (version) VALUES (?)",
                [migration.version],
            )?;
        }
    }

    Ok(())
}
