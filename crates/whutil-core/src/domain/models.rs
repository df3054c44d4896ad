use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::{UsageTimestamp, ValidationError};

const DEFAULT_QUERY_HISTORY_TABLE: &str = "query_history";
const DEFAULT_METERING_HISTORY_TABLE: &str = "warehouse_metering_history";

/// One executed query from the query log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_id: Option<String>,
    pub warehouse_id: i64,
    pub warehouse_name: String,
    /// Size label as logged; `None` for queries that ran without a warehouse.
    pub warehouse_size: Option<String>,
    pub start_time: UsageTimestamp,
    pub cluster_number: Option<i32>,
    pub total_elapsed_time_ms: u64,
}

/// Credits billed for one warehouse over one hour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeteringFact {
    pub warehouse_id: i64,
    pub warehouse_name: String,
    /// Start of the metered hour.
    pub start_time: UsageTimestamp,
    pub credits_used: f64,
}

impl MeteringFact {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.credits_used.is_finite() {
            return Err(ValidationError::NonFiniteValue {
                field: "credits_used",
            });
        }
        if self.credits_used < 0.0 {
            return Err(ValidationError::NegativeValue {
                field: "credits_used",
            });
        }
        Ok(())
    }
}

/// Per (warehouse, size) row as returned by the utilization query.
///
/// Every numeric column is nullable at the SQL level: a warehouse without
/// metering rows in the range comes back with no actual credits at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageAggregate {
    pub warehouse_name: String,
    pub warehouse_size: Option<String>,
    pub num_queries: Option<i64>,
    pub total_elapsed_time_ms: Option<f64>,
    pub expected_credits: Option<f64>,
    pub actual_credits: Option<f64>,
}

/// Validated `[catalog.][schema.]table` reference.
///
/// Table names cannot be bound as SQL parameters, so they are restricted to
/// plain identifiers before being spliced into query text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableRef(String);

impl TableRef {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTableReference);
        }

        let segments = trimmed.split('.').collect::<Vec<_>>();
        let valid = segments.len() <= 3 && segments.iter().all(|segment| is_identifier(segment));
        if !valid {
            return Err(ValidationError::InvalidTableReference {
                value: trimmed.to_owned(),
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TableRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for TableRef {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TableRef> for String {
    fn from(value: TableRef) -> Self {
        value.0
    }
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// The query log and metering log the report reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTables {
    pub query_history: TableRef,
    pub metering_history: TableRef,
}

impl SourceTables {
    pub fn new(query_history: &str, metering_history: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            query_history: TableRef::parse(query_history)?,
            metering_history: TableRef::parse(metering_history)?,
        })
    }
}

impl Default for SourceTables {
    fn default() -> Self {
        Self {
            query_history: TableRef(String::from(DEFAULT_QUERY_HISTORY_TABLE)),
            metering_history: TableRef(String::from(DEFAULT_METERING_HISTORY_TABLE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_qualified_table_reference() {
        let table = TableRef::parse("snowflake.account_usage.query_history").expect("must parse");
        assert_eq!(table.as_str(), "snowflake.account_usage.query_history");
    }

    #[test]
    fn rejects_injection_in_table_reference() {
        for bad in [
            "query_history; DROP TABLE x",
            "query_history--",
            "a.b.c.d",
            "1table",
            "schema..table",
            "\"quoted\"",
        ] {
            let err = TableRef::parse(bad).expect_err(bad);
            assert!(matches!(err, ValidationError::InvalidTableReference { .. }), "{bad}");
        }
    }

    #[test]
    fn rejects_blank_table_reference() {
        assert_eq!(TableRef::parse("  "), Err(ValidationError::EmptyTableReference));
    }

    #[test]
    fn default_tables_match_usage_view_names() {
        let tables = SourceTables::default();
        assert_eq!(tables.query_history.as_str(), "query_history");
        assert_eq!(tables.metering_history.as_str(), "warehouse_metering_history");
    }

    #[test]
    fn metering_fact_rejects_negative_credits() {
        let fact = MeteringFact {
            warehouse_id: 1,
            warehouse_name: String::from("WH1"),
            start_time: UsageTimestamp::parse("2024-01-01 00:00:00").expect("ts"),
            credits_used: -1.0,
        };
        assert_eq!(
            fact.validate(),
            Err(ValidationError::NegativeValue {
                field: "credits_used"
            })
        );
    }
}
