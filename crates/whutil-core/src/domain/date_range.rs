use std::fmt::{Display, Formatter};

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{Date, PrimitiveDateTime, Time};

use crate::ValidationError;

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Calendar date window `[start, end)` selecting usage by timestamp.
///
/// Both bounds are midnight of the given dates, so `end` itself is excluded.
/// A range must cover at least one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: Date,
    end: Date,
}

impl DateRange {
    pub fn new(start: Date, end: Date) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::EmptyDateRange {
                start: format_date(start),
                end: format_date(end),
            });
        }

        Ok(Self { start, end })
    }

    /// Parse `YYYY-MM-DD` bounds.
    pub fn parse(start: &str, end: &str) -> Result<Self, ValidationError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn start(&self) -> Date {
        self.start
    }

    pub fn end(&self) -> Date {
        self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).whole_days()
    }

    /// Inclusive lower bound as a SQL timestamp literal value.
    pub fn start_bound(&self) -> String {
        format!("{} 00:00:00", format_date(self.start))
    }

    /// Exclusive upper bound as a SQL timestamp literal value.
    pub fn end_bound(&self) -> String {
        format!("{} 00:00:00", format_date(self.end))
    }

    pub fn contains(&self, instant: PrimitiveDateTime) -> bool {
        instant >= PrimitiveDateTime::new(self.start, Time::MIDNIGHT)
            && instant < PrimitiveDateTime::new(self.end, Time::MIDNIGHT)
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", format_date(self.start), format_date(self.end))
    }
}

impl Serialize for DateRange {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("DateRange", 2)?;
        state.serialize_field("start", &format_date(self.start))?;
        state.serialize_field("end", &format_date(self.end))?;
        state.end()
    }
}

pub fn parse_date(input: &str) -> Result<Date, ValidationError> {
    Date::parse(input.trim(), DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        value: input.to_owned(),
    })
}

fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| String::from("<unformattable>"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime};

    #[test]
    fn parses_valid_range() {
        let range = DateRange::parse("2024-01-01", "2024-02-01").expect("must parse");
        assert_eq!(range.start(), date!(2024 - 01 - 01));
        assert_eq!(range.days(), 31);
        assert_eq!(range.start_bound(), "2024-01-01 00:00:00");
        assert_eq!(range.end_bound(), "2024-02-01 00:00:00");
    }

    #[test]
    fn rejects_equal_bounds() {
        let err = DateRange::parse("2024-03-05", "2024-03-05").expect_err("must fail");
        assert!(matches!(err, ValidationError::EmptyDateRange { .. }));
    }

    #[test]
    fn rejects_inverted_bounds() {
        let err = DateRange::new(date!(2024 - 03 - 06), date!(2024 - 03 - 05)).expect_err("must fail");
        assert_eq!(
            err.to_string(),
            "end date 2024-03-05 must be after start date 2024-03-06"
        );
    }

    #[test]
    fn rejects_malformed_date() {
        let err = DateRange::parse("2024/01/01", "2024-02-01").expect_err("must fail");
        assert!(matches!(err, ValidationError::InvalidDate { .. }));
    }

    #[test]
    fn end_bound_is_exclusive() {
        let range = DateRange::parse("2024-01-01", "2024-01-02").expect("must parse");
        assert!(range.contains(datetime!(2024-01-01 0:00)));
        assert!(range.contains(datetime!(2024-01-01 23:59:59)));
        assert!(!range.contains(datetime!(2024-01-02 0:00)));
        assert!(!range.contains(datetime!(2023-12-31 23:59:59)));
    }

    #[test]
    fn serializes_as_iso_dates() {
        let range = DateRange::parse("2024-01-01", "2024-01-08").expect("must parse");
        let json = serde_json::to_value(range).expect("serializes");
        assert_eq!(json, serde_json::json!({ "start": "2024-01-01", "end": "2024-01-08" }));
    }
}
