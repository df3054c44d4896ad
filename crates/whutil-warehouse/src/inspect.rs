//! Read-only browsing of the usage tables and views.
//!
//! Only the relations this crate creates can be inspected. The projection is
//! built from the relation's own `DESCRIBE` output and the optional date range
//! is bound, so no user text ever reaches the SQL.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use ::duckdb::types::Value as DuckValue;
use ::duckdb::{Connection, ToSql};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use whutil_core::DateRange;

use crate::WarehouseError;

pub const DEFAULT_INSPECT_LIMIT: usize = 100;

/// A table or view owned by the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageRelation {
    QueryHistory,
    MeteringHistory,
    IngestLog,
    QueryHourly,
    MeteringDaily,
}

impl UsageRelation {
    pub const ALL: [Self; 5] = [
        Self::QueryHistory,
        Self::MeteringHistory,
        Self::IngestLog,
        Self::QueryHourly,
        Self::MeteringDaily,
    ];

    /// Name of the relation in the database.
    pub const fn relation_name(self) -> &'static str {
        match self {
            Self::QueryHistory => "query_history",
            Self::MeteringHistory => "warehouse_metering_history",
            Self::IngestLog => "ingest_log",
            Self::QueryHourly => "vw_query_hourly",
            Self::MeteringDaily => "vw_metering_daily",
        }
    }

    /// Short name used on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::QueryHistory => "query-history",
            Self::MeteringHistory => "metering",
            Self::IngestLog => "ingest-log",
            Self::QueryHourly => "query-hourly",
            Self::MeteringDaily => "metering-daily",
        }
    }

    const fn time_column(self) -> &'static str {
        match self {
            Self::QueryHistory | Self::MeteringHistory => "start_time",
            Self::IngestLog => "timestamp",
            Self::QueryHourly => "hour_bucket",
            Self::MeteringDaily => "usage_date",
        }
    }

    const fn order_by(self) -> &'static str {
        match self {
            Self::QueryHistory => r#""start_time", "warehouse_id", "query_id""#,
            Self::MeteringHistory => r#""start_time", "warehouse_id""#,
            Self::IngestLog => r#""timestamp", "request_id""#,
            Self::QueryHourly => r#""hour_bucket", "warehouse_id", "warehouse_size""#,
            Self::MeteringDaily => r#""usage_date", "warehouse_id""#,
        }
    }
}

impl Display for UsageRelation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UsageRelation {
    type Err = WarehouseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|relation| {
                relation.as_str() == wanted || relation.relation_name().replace('_', "-") == wanted
            })
            .ok_or_else(|| {
                let known = Self::ALL.map(Self::as_str).join(", ");
                WarehouseError::QueryRejected(format!(
                    "unknown relation '{}'; expected one of {known}",
                    s.trim()
                ))
            })
    }
}

/// A column as reported by `DESCRIBE`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: String,
}

/// Rows read from one [`UsageRelation`].
#[derive(Debug, Clone, Serialize)]
pub struct RelationRows {
    pub relation: UsageRelation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<DateRange>,
    pub columns: Vec<RelationColumn>,
    /// Timestamps and dates are rendered as text.
    pub rows: Vec<Vec<Value>>,
    pub row_count: usize,
    /// More rows matched than `limit` allowed.
    pub truncated: bool,
}

impl RelationRows {
    /// Values of the named column in row order.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.columns.iter().position(|column| column.name == name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }
}

pub(crate) fn select_rows(
    connection: &Connection,
    relation: UsageRelation,
    range: Option<&DateRange>,
    limit: usize,
) -> Result<RelationRows, WarehouseError> {
    if limit == 0 {
        return Err(WarehouseError::QueryRejected(String::from(
            "--limit must be greater than zero",
        )));
    }

    let columns = describe(connection, relation.relation_name())?;
    let projection = columns
        .iter()
        .map(project_column)
        .collect::<Vec<_>>()
        .join(", ");
    let filter = match range {
        Some(_) => format!(
            r#" WHERE "{column}" >= CAST(? AS TIMESTAMP) AND "{column}" < CAST(? AS TIMESTAMP)"#,
            column = relation.time_column()
        ),
        None => String::new(),
    };
    // One extra row tells us whether the limit cut anything off.
    let sql = format!(
        "SELECT {projection} FROM {name}{filter} ORDER BY {order} LIMIT {fetch}",
        name = relation.relation_name(),
        order = relation.order_by(),
        fetch = limit.saturating_add(1),
    );
    debug!(%relation, sql = %sql, "inspecting relation");

    let bounds = range.map(|range| [range.start_bound(), range.end_bound()]);
    let params: Vec<&dyn ToSql> = bounds
        .iter()
        .flatten()
        .map(|bound| bound as &dyn ToSql)
        .collect();

    let mut statement = connection.prepare(sql.as_str())?;
    let mut cursor = statement.query(params.as_slice())?;
    let mut rows = Vec::new();
    let mut truncated = false;
    while let Some(row) = cursor.next()? {
        if rows.len() == limit {
            truncated = true;
            break;
        }
        let values = (0..columns.len())
            .map(|index| row.get::<_, DuckValue>(index).map(json_value))
            .collect::<Result<Vec<_>, _>>()?;
        rows.push(values);
    }

    debug!(%relation, rows = rows.len(), truncated, "relation inspected");
    Ok(RelationRows {
        relation,
        range: range.copied(),
        columns,
        row_count: rows.len(),
        rows,
        truncated,
    })
}

/// Column names and types of any relation expression, in order.
pub(crate) fn describe(
    connection: &Connection,
    relation: &str,
) -> Result<Vec<RelationColumn>, WarehouseError> {
    let mut statement = connection.prepare(&format!("DESCRIBE SELECT * FROM {relation}"))?;
    let columns = statement
        .query_map([] as [&dyn ToSql; 0], |row| {
            Ok(RelationColumn {
                name: row.get(0)?,
                column_type: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(columns)
}

fn project_column(column: &RelationColumn) -> String {
    let temporal = column.column_type.starts_with("TIMESTAMP") || column.column_type == "DATE";
    if temporal {
        format!(r#"CAST("{name}" AS VARCHAR) AS "{name}""#, name = column.name)
    } else {
        format!(r#""{}""#, column.name)
    }
}

fn json_value(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(flag) => Value::from(flag),
        DuckValue::TinyInt(number) => Value::from(number),
        DuckValue::SmallInt(number) => Value::from(number),
        DuckValue::Int(number) => Value::from(number),
        DuckValue::BigInt(number) => Value::from(number),
        DuckValue::HugeInt(number) => {
            i64::try_from(number).map_or_else(|_| Value::from(number.to_string()), Value::from)
        }
        DuckValue::UTinyInt(number) => Value::from(number),
        DuckValue::USmallInt(number) => Value::from(number),
        DuckValue::UInt(number) => Value::from(number),
        DuckValue::UBigInt(number) => Value::from(number),
        // Non-finite floats become null.
        DuckValue::Float(number) => Value::from(number),
        DuckValue::Double(number) => Value::from(number),
        DuckValue::Text(text) => Value::from(text),
        other => Value::from(format!("{other:?}")),
    }
}
