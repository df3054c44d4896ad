//! Response envelope wrapped around every `whutil` output.
//!
//! A successful command carries its payload in `data`; a failed one carries
//! `data: null` and one or more [`EnvelopeError`]s, so consumers parse a single
//! shape either way.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::ValidationError;

const MIN_REQUEST_ID_LEN: usize = 8;
const TRACE_ID_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub meta: EnvelopeMeta,
    pub data: T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<EnvelopeError>,
}

impl<T> Envelope<T> {
    pub fn success(meta: EnvelopeMeta, data: T) -> Self {
        Self {
            meta,
            data,
            errors: Vec::new(),
        }
    }

    pub fn is_failure(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl<T: Default> Envelope<T> {
    /// Envelope for a command that produced no data.
    pub fn failure(meta: EnvelopeMeta, errors: Vec<EnvelopeError>) -> Result<Self, ValidationError> {
        if errors.is_empty() {
            return Err(ValidationError::MissingErrors);
        }
        meta.validate_schema_compliance()?;
        errors.iter().try_for_each(EnvelopeError::validate)?;

        Ok(Self {
            meta,
            data: T::default(),
            errors,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeMeta {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// `vMAJOR.MINOR.PATCH`.
    pub schema_version: String,
    /// RFC 3339, UTC.
    pub generated_at: String,
    /// Backend that produced `data`: `duckdb`, `builtin` or `whutil`.
    pub source: String,
    pub latency_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl EnvelopeMeta {
    pub fn new(
        request_id: impl Into<String>,
        schema_version: impl Into<String>,
        source: impl Into<String>,
        latency_ms: u64,
    ) -> Result<Self, ValidationError> {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"));
        let meta = Self {
            request_id: request_id.into(),
            trace_id: None,
            schema_version: schema_version.into(),
            generated_at,
            source: source.into(),
            latency_ms,
            warnings: Vec::new(),
        };
        meta.validate_schema_compliance()?;
        Ok(meta)
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Result<Self, ValidationError> {
        let trace_id = trace_id.into();
        check_trace_id(trace_id.as_str())?;
        self.trace_id = Some(trace_id);
        Ok(self)
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn validate_schema_compliance(&self) -> Result<(), ValidationError> {
        if self.request_id.trim().len() < MIN_REQUEST_ID_LEN {
            return Err(ValidationError::InvalidRequestId);
        }
        if let Some(trace_id) = self.trace_id.as_deref() {
            check_trace_id(trace_id)?;
        }
        if !is_semver_tag(self.schema_version.as_str()) {
            return Err(ValidationError::InvalidSchemaVersion {
                value: self.schema_version.clone(),
            });
        }
        if self.source.trim().is_empty() {
            return Err(ValidationError::EmptySource);
        }
        Ok(())
    }
}

/// One failure reported in a failed envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeError {
    /// Stable machine-readable category, e.g. `validation`.
    pub code: String,
    pub message: String,
}

impl EnvelopeError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Result<Self, ValidationError> {
        let error = Self {
            code: code.into(),
            message: message.into(),
        };
        error.validate()?;
        Ok(error)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match (self.code.trim().is_empty(), self.message.trim().is_empty()) {
            (true, _) => Err(ValidationError::EmptyErrorCode),
            (false, true) => Err(ValidationError::EmptyErrorMessage),
            (false, false) => Ok(()),
        }
    }
}

fn check_trace_id(value: &str) -> Result<(), ValidationError> {
    let well_formed = value.len() == TRACE_ID_LEN
        && value.bytes().all(|byte| byte.is_ascii_hexdigit())
        && value.bytes().any(|byte| byte != b'0');
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::InvalidTraceId)
    }
}

fn is_semver_tag(value: &str) -> bool {
    let Some(numbers) = value.strip_prefix('v') else {
        return false;
    };
    let parts: Vec<&str> = numbers.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    fn meta() -> EnvelopeMeta {
        EnvelopeMeta::new("request-12345", "v1.0.0", "duckdb", 11).expect("meta should be valid")
    }

    #[test]
    fn stamps_generation_time_in_utc() {
        let meta = meta();
        assert_eq!(meta.schema_version, "v1.0.0");
        assert!(meta.generated_at.ends_with('Z'));
    }

    #[test]
    fn rejects_malformed_meta() {
        for version in ["1.0.0", "v1.0", "v1.0.x", "v1..0"] {
            let err = EnvelopeMeta::new("request-12345", version, "duckdb", 1).expect_err(version);
            assert!(matches!(err, ValidationError::InvalidSchemaVersion { .. }));
        }
        assert_eq!(
            EnvelopeMeta::new("request-12345", "v1.0.0", " ", 1).expect_err("blank source"),
            ValidationError::EmptySource
        );
        assert_eq!(
            EnvelopeMeta::new("short", "v1.0.0", "duckdb", 1).expect_err("short id"),
            ValidationError::InvalidRequestId
        );
    }

    #[test]
    fn rejects_invalid_trace_id() {
        let zeros = "0".repeat(32);
        for trace_id in ["not-a-trace-id", zeros.as_str()] {
            let err = meta().with_trace_id(trace_id).expect_err(trace_id);
            assert!(matches!(err, ValidationError::InvalidTraceId));
        }
    }

    #[test]
    fn failure_carries_errors_and_null_data() {
        let error = EnvelopeError::new("validation", "end date must be after start date")
            .expect("error");
        let envelope = Envelope::<Value>::failure(meta(), vec![error]).expect("failure envelope");

        assert!(envelope.is_failure());
        let json = serde_json::to_value(&envelope).expect("json");
        assert_eq!(json["data"], Value::Null);
        assert_eq!(json["errors"][0]["code"], "validation");
    }

    #[test]
    fn failure_requires_a_valid_error() {
        let err = Envelope::<Value>::failure(meta(), Vec::new()).expect_err("no errors");
        assert_eq!(err, ValidationError::MissingErrors);

        let err = EnvelopeError::new("", "message").expect_err("blank code");
        assert_eq!(err, ValidationError::EmptyErrorCode);
        let err = EnvelopeError::new("io", "  ").expect_err("blank message");
        assert_eq!(err, ValidationError::EmptyErrorMessage);
    }

    #[test]
    fn success_omits_errors_field() {
        let json = serde_json::to_value(Envelope::success(meta(), 1_u8)).expect("json");
        assert!(json.get("errors").is_none());
    }
}
