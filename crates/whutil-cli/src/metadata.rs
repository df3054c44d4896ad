use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use whutil_core::{EnvelopeMeta, ValidationError};

pub const SCHEMA_VERSION: &str = "v1.0.0";

/// Request identifier (UUID v4), also recorded in `ingest_log`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Trace identifier (W3C-style 16-byte hex).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for TraceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Per-invocation metadata that becomes the envelope `meta` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub request_id: RequestId,
    pub trace_id: TraceId,
    pub source: String,
    pub latency_ms: u64,
    pub warnings: Vec<String>,
}

impl Metadata {
    pub fn new(request_id: RequestId, source: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            request_id,
            trace_id: TraceId::new(),
            source: source.into(),
            latency_ms,
            warnings: Vec::new(),
        }
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn into_envelope_meta(self, schema_version: &str) -> Result<EnvelopeMeta, ValidationError> {
        let mut envelope_meta = EnvelopeMeta::new(
            self.request_id.to_string(),
            schema_version,
            self.source,
            self.latency_ms,
        )?
        .with_trace_id(self.trace_id.to_string())?;

        for warning in self.warnings {
            envelope_meta.push_warning(warning);
        }

        Ok(envelope_meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_is_uuid_v4() {
        let request_id = RequestId::new_v4();
        assert_eq!(request_id.0.get_version_num(), 4);
    }

    #[test]
    fn trace_id_is_32_hex_chars() {
        let trace_id = TraceId::new();
        assert_eq!(trace_id.as_str().len(), 32);
        assert!(trace_id.as_str().chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn envelope_meta_keeps_ids_and_warnings() {
        let request_id = RequestId::new_v4();
        let mut metadata = Metadata::new(request_id, "duckdb", 12);
        metadata.push_warning("row excluded");
        let trace_id = metadata.trace_id.clone();

        let meta = metadata
            .into_envelope_meta(SCHEMA_VERSION)
            .expect("valid meta");

        assert_eq!(meta.request_id, request_id.to_string());
        assert_eq!(meta.trace_id.as_deref(), Some(trace_id.as_str()));
        assert_eq!(meta.source, "duckdb");
        assert_eq!(meta.latency_ms, 12);
        assert_eq!(meta.warnings, vec![String::from("row excluded")]);
    }
}
