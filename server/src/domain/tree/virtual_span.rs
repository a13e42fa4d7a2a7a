//! Virtual span projection
//!
//! Guard events and function-call attempts live inside a real span's
//! attribute bag. The viewer shows them as their own rows, but they are
//! read-only projections, never nodes in the span set: each row is keyed by a
//! [`SpanRef::Synthetic`] and selecting one navigates to its parent span.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::span::{SpanRecord, SpanRef, SyntheticKind};

/// A synthetic display row derived from a real span's embedded sub-records
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VirtualSpan {
    /// String form of the synthetic key, as accepted by `SpanRef::parse`
    pub key: String,
    pub parent_span_id: String,
    pub kind: SyntheticKind,
    pub title: String,
    pub severity: Option<String>,
    pub decision: Option<String>,
    pub reason: Option<String>,
    /// Display position; virtual rows have no time range of their own
    pub start_time: DateTime<Utc>,
}

/// Expand one real span's attributes into its virtual rows
pub fn virtual_spans_for(span: &SpanRecord) -> Vec<VirtualSpan> {
    let mut rows = Vec::new();

    for event in &span.attributes.guard_events {
        if event.id.is_empty() {
            continue;
        }
        let key = SpanRef::Synthetic {
            parent: span.span_id.clone(),
            kind: SyntheticKind::GuardEvent,
            local_id: event.id.clone(),
        };
        rows.push(VirtualSpan {
            key: key.display_key(),
            parent_span_id: span.span_id.clone(),
            kind: SyntheticKind::GuardEvent,
            title: event
                .decision
                .clone()
                .unwrap_or_else(|| "guard event".to_string()),
            severity: event.severity.clone(),
            decision: event.decision.clone(),
            reason: event.reason.clone(),
            start_time: span.start_time,
        });
    }

    for (index, attempt) in span.attributes.function_attempts.iter().enumerate() {
        let key = SpanRef::Synthetic {
            parent: span.span_id.clone(),
            kind: SyntheticKind::FunctionAttempt,
            local_id: index.to_string(),
        };
        rows.push(VirtualSpan {
            key: key.display_key(),
            parent_span_id: span.span_id.clone(),
            kind: SyntheticKind::FunctionAttempt,
            title: attempt.function_name.clone(),
            severity: attempt.severity.clone(),
            decision: attempt.decision.clone(),
            reason: attempt.reason.clone(),
            start_time: span.start_time,
        });
    }

    rows
}

/// Expand the whole materialized set. Pending placeholders carry no
/// attributes, so they contribute nothing.
pub fn virtual_spans(spans: &[SpanRecord]) -> Vec<VirtualSpan> {
    spans.iter().flat_map(virtual_spans_for).collect()
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::domain::tree::span::{FunctionAttempt, GuardEvent};

    fn span_with_events() -> SpanRecord {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let mut s = SpanRecord::placeholder("s1", None, "s1", t, t);
        s.pending = false;
        s.attributes.guard_events = vec![GuardEvent {
            id: "ev1".into(),
            severity: Some("high".into()),
            decision: Some("block".into()),
            reason: Some("prompt injection".into()),
        }];
        s.attributes.function_attempts = vec![
            FunctionAttempt {
                function_name: "send_email".into(),
                severity: Some("medium".into()),
                decision: Some("quarantine".into()),
                reason: None,
            },
            FunctionAttempt {
                function_name: "read_file".into(),
                ..Default::default()
            },
        ];
        s
    }

    #[test]
    fn test_expands_events_and_attempts() {
        let rows = virtual_spans_for(&span_with_events());
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].key, "s1-guard-event-ev1");
        assert_eq!(rows[0].severity.as_deref(), Some("high"));
        assert_eq!(rows[1].key, "s1-function-attempt-0");
        assert_eq!(rows[1].title, "send_email");
        assert_eq!(rows[2].key, "s1-function-attempt-1");
    }

    #[test]
    fn test_keys_round_trip_to_parent() {
        for row in virtual_spans_for(&span_with_events()) {
            let r = SpanRef::parse(&row.key);
            assert!(r.is_synthetic());
            assert_eq!(r.real_id(), "s1");
        }
    }

    #[test]
    fn test_span_without_sub_records_has_no_rows() {
        let t = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let s = SpanRecord::placeholder("bare", None, "bare", t, t);
        assert!(virtual_spans_for(&s).is_empty());
    }

    #[test]
    fn test_event_without_id_skipped() {
        let mut s = span_with_events();
        s.attributes.guard_events[0].id.clear();
        let rows = virtual_spans_for(&s);
        assert!(rows.iter().all(|r| r.kind == SyntheticKind::FunctionAttempt));
    }
}
