//! Wire types for the analysis backend
//!
//! The backend is consumed through its JSON contracts only. Deserialization
//! is defensive throughout: missing numeric fields become zero, missing
//! totals are recomputed from their parts, and unknown attributes pass
//! through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::domain::tree::span::{SpanAttributes, SpanRecord, SpanStatus, SpanType};
use crate::utils::time::parse_iso_timestamp;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Backend request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend returned {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
    #[error("Backend response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Realtime stream for trace {trace_id} disconnected: {reason}")]
    StreamClosed { trace_id: String, reason: String },
}

impl UpstreamError {
    /// Whether retrying the same request could plausibly succeed
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Http(e) => e.is_timeout() || e.is_connect(),
            UpstreamError::Status { status, .. } => *status >= 500,
            UpstreamError::Decode(_) => false,
            UpstreamError::StreamClosed { .. } => true,
        }
    }
}

// ============================================================================
// TRACE SUMMARY
// ============================================================================

/// Trace-level aggregate as served to the UI.
///
/// During a live subscription the merge layer only widens this record: the
/// time window grows outward and the counters never decrease.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TraceSummary {
    pub trace_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_tokens: i64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default)]
    pub span_count: u64,
    #[serde(default)]
    pub has_browser_session: bool,
}

// ============================================================================
// RAW SPANS
// ============================================================================

/// A span exactly as the backend sends it, before normalization
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RawSpan {
    pub span_id: String,
    #[serde(default)]
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub span_type: SpanType,
    #[serde(default)]
    pub status: SpanStatus,
    /// RFC 3339 strings on the wire; unparseable values degrade to epoch
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub input_tokens: Option<i64>,
    #[serde(default)]
    pub output_tokens: Option<i64>,
    #[serde(default)]
    pub total_tokens: Option<i64>,
    #[serde(default)]
    pub input_cost: Option<f64>,
    #[serde(default)]
    pub output_cost: Option<f64>,
    #[serde(default)]
    pub total_cost: Option<f64>,
    #[serde(default)]
    pub attributes: SpanAttributes,
}

impl RawSpan {
    /// Normalize into the viewer's span record.
    ///
    /// Missing metric fields default to zero and a missing total falls back
    /// to the sum of its parts, so downstream aggregation never sees holes.
    pub fn normalize(self) -> SpanRecord {
        let input_tokens = self.input_tokens.unwrap_or(0);
        let output_tokens = self.output_tokens.unwrap_or(0);
        let input_cost = self.input_cost.unwrap_or(0.0);
        let output_cost = self.output_cost.unwrap_or(0.0);
        let start_time = parse_iso_timestamp(&self.start_time);

        SpanRecord {
            span_id: self.span_id,
            parent_span_id: self.parent_span_id.filter(|p| !p.is_empty()),
            name: self.name,
            span_type: self.span_type,
            status: self.status,
            start_time,
            end_time: if self.end_time.is_empty() {
                start_time
            } else {
                parse_iso_timestamp(&self.end_time)
            },
            input_tokens,
            output_tokens,
            total_tokens: self.total_tokens.unwrap_or(input_tokens + output_tokens),
            input_cost,
            output_cost,
            total_cost: self.total_cost.unwrap_or(input_cost + output_cost),
            attributes: self.attributes,
            pending: false,
            collapsed: false,
            aggregated: None,
        }
    }
}

/// `span_update` event payload: a single span or a batch
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SpanUpdatePayload {
    One(Box<RawSpan>),
    Many(Vec<RawSpan>),
}

impl SpanUpdatePayload {
    pub fn into_spans(self) -> Vec<RawSpan> {
        match self {
            SpanUpdatePayload::One(span) => vec![*span],
            SpanUpdatePayload::Many(spans) => spans,
        }
    }
}

// ============================================================================
// QUERY PARAMETERS
// ============================================================================

/// Search/filter parameters forwarded to the backend's span listing
#[derive(Debug, Clone, Default, Serialize)]
pub struct SpanQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_in: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: serde_json::Value) -> RawSpan {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_normalize_total_fallbacks() {
        let span = raw(serde_json::json!({
            "span_id": "s1",
            "start_time": "2026-03-01T10:00:00Z",
            "end_time": "2026-03-01T10:01:00Z",
            "input_tokens": 100,
            "output_tokens": 40,
            "input_cost": 0.001,
            "output_cost": 0.002,
        }))
        .normalize();

        assert_eq!(span.total_tokens, 140);
        assert!((span.total_cost - 0.003).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_explicit_total_wins() {
        let span = raw(serde_json::json!({
            "span_id": "s1",
            "start_time": "2026-03-01T10:00:00Z",
            "input_tokens": 100,
            "output_tokens": 40,
            "total_tokens": 150,
        }))
        .normalize();
        assert_eq!(span.total_tokens, 150);
    }

    #[test]
    fn test_normalize_missing_metrics_zeroed() {
        let span = raw(serde_json::json!({
            "span_id": "s1",
            "start_time": "2026-03-01T10:00:00Z",
        }))
        .normalize();

        assert_eq!(span.total_tokens, 0);
        assert_eq!(span.total_cost, 0.0);
        assert!(!span.pending);
        // Missing end time collapses to the start
        assert_eq!(span.end_time, span.start_time);
    }

    #[test]
    fn test_normalize_empty_parent_dropped() {
        let span = raw(serde_json::json!({
            "span_id": "s1",
            "parent_span_id": "",
            "start_time": "2026-03-01T10:00:00Z",
        }))
        .normalize();
        assert_eq!(span.parent_span_id, None);
    }

    #[test]
    fn test_update_payload_single_and_batch() {
        let one: SpanUpdatePayload = serde_json::from_value(serde_json::json!({
            "span_id": "a", "start_time": "2026-03-01T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(one.into_spans().len(), 1);

        let many: SpanUpdatePayload = serde_json::from_value(serde_json::json!([
            {"span_id": "a", "start_time": "2026-03-01T10:00:00Z"},
            {"span_id": "b", "start_time": "2026-03-01T10:00:01Z"},
        ]))
        .unwrap();
        assert_eq!(many.into_spans().len(), 2);
    }

    #[test]
    fn test_transient_classification() {
        let not_found = UpstreamError::Status {
            status: 404,
            path: "/traces/x".into(),
            body: String::new(),
        };
        let unavailable = UpstreamError::Status {
            status: 503,
            path: "/traces/x".into(),
            body: String::new(),
        };
        let dropped = UpstreamError::StreamClosed {
            trace_id: "x".into(),
            reason: "reset".into(),
        };
        assert!(!not_found.is_transient());
        assert!(unavailable.is_transient());
        assert!(dropped.is_transient());
    }

    #[test]
    fn test_guard_attributes_survive_normalization() {
        let span = raw(serde_json::json!({
            "span_id": "s1",
            "start_time": "2026-03-01T10:00:00Z",
            "attributes": {
                "guard_events": [{"id": "e1", "severity": "high"}],
                "vendor.tag": "kept",
            },
        }))
        .normalize();

        assert_eq!(span.attributes.guard_events.len(), 1);
        assert_eq!(span.attributes.extra["vendor.tag"], "kept");
    }
}
