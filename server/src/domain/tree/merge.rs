//! Realtime merge
//!
//! Folds incremental span upserts from the push channel into the live span
//! set. Updates can arrive out of order, for spans already known or unknown;
//! merge is always replace-or-append followed by a full re-sort and a fresh
//! synthesize/aggregate pass, so consumers never observe the set out of order
//! or with a pending node shadowing real data.

use std::cmp::Ordering;

use super::aggregate::aggregate_metrics;
use super::span::SpanRecord;
use super::synthesize::fill_pending_ancestors;
use crate::upstream::TraceSummary;

/// Run the full materialization pipeline over a span set:
/// synthesize missing ancestors, sort ascending by start time, aggregate.
pub fn materialize(spans: Vec<SpanRecord>) -> Vec<SpanRecord> {
    let mut spans = fill_pending_ancestors(spans);
    sort_spans(&mut spans);
    aggregate_metrics(&mut spans);
    spans
}

/// Apply one incoming record to the set and re-materialize.
///
/// An existing entry with the same id is replaced in place, keeping only the
/// `collapsed` UI flag from the old entry; a pending placeholder is replaced
/// outright. Unknown ids are appended.
pub fn merge_span_update(mut spans: Vec<SpanRecord>, mut incoming: SpanRecord) -> Vec<SpanRecord> {
    match spans.iter_mut().find(|s| s.span_id == incoming.span_id) {
        Some(existing) => {
            incoming.collapsed = existing.collapsed;
            *existing = incoming;
        }
        None => spans.push(incoming),
    }
    materialize(spans)
}

/// Stable ascending order by start time; span id breaks ties so repeated
/// materialization is deterministic.
pub fn sort_spans(spans: &mut [SpanRecord]) {
    spans.sort_by(|a, b| match a.start_time.cmp(&b.start_time) {
        Ordering::Equal => a.span_id.cmp(&b.span_id),
        other => other,
    });
}

/// Widen the trace-level aggregate for one incoming record.
///
/// Monotonic for the lifetime of a trace subscription: the time window only
/// widens and the token/cost counters only increase. Replacements contribute
/// the growth over what the previous version of the span already counted, so
/// repeated upserts for the same span never double count.
pub fn widen_trace_aggregate(
    trace: &mut TraceSummary,
    incoming: &SpanRecord,
    previous: Option<&SpanRecord>,
) {
    trace.start_time = trace.start_time.min(incoming.start_time);
    trace.end_time = match trace.end_time {
        Some(end) => Some(end.max(incoming.end_time)),
        None => Some(incoming.end_time),
    };

    let (prev_tokens, prev_cost) = previous
        .filter(|p| !p.pending)
        .map(|p| (p.total_tokens, p.total_cost))
        .unwrap_or((0, 0.0));
    trace.total_tokens += (incoming.total_tokens - prev_tokens).max(0);
    trace.total_cost += (incoming.total_cost - prev_cost).max(0.0);
    if previous.is_none() {
        trace.span_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::domain::tree::span::{SpanAttributes, SpanType};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, h, m, 0).unwrap()
    }

    fn real_span(id: &str, parent: Option<&str>, start: DateTime<Utc>) -> SpanRecord {
        let mut s = SpanRecord::placeholder(id, parent.map(str::to_string), id, start, start);
        s.pending = false;
        s
    }

    fn assert_sorted(spans: &[SpanRecord]) {
        assert!(
            spans.windows(2).all(|w| w[0].start_time <= w[1].start_time),
            "set not sorted by start_time"
        );
    }

    #[test]
    fn test_append_unknown_span_keeps_sort() {
        let spans = vec![real_span("a", None, at(10, 0))];
        let merged = merge_span_update(spans, real_span("b", Some("a"), at(9, 0)));

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].span_id, "b");
        assert_sorted(&merged);
    }

    #[test]
    fn test_replace_preserves_collapsed_only() {
        let mut old = real_span("a", None, at(10, 0));
        old.collapsed = true;
        old.name = "stale".into();

        let mut update = real_span("a", None, at(10, 0));
        update.name = "fresh".into();

        let merged = merge_span_update(vec![old], update);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "fresh");
        assert!(merged[0].collapsed);
    }

    #[test]
    fn test_real_record_replaces_pending_placeholder() {
        let placeholder = SpanRecord::placeholder("x", None, "x", at(10, 0), at(10, 5));
        let merged = merge_span_update(vec![placeholder], real_span("x", None, at(9, 0)));

        let x: Vec<_> = merged.iter().filter(|s| s.span_id == "x").collect();
        assert_eq!(x.len(), 1);
        assert!(!x[0].pending);
    }

    #[test]
    fn test_merge_resolves_and_introduces_pending() {
        // The arriving span resolves nothing but references a missing
        // ancestor, so the pipeline must synthesize it in the same pass.
        let mut incoming = real_span("leaf", Some("missing"), at(10, 0));
        incoming.attributes = SpanAttributes {
            ancestor_id_path: Some(vec!["missing".into()]),
            ancestor_name_path: Some(vec!["agent".into()]),
            ..Default::default()
        };
        let merged = merge_span_update(Vec::new(), incoming);

        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|s| s.span_id == "missing" && s.pending));
        assert_sorted(&merged);
    }

    #[test]
    fn test_merge_reaggregates() {
        let root = real_span("root", None, at(10, 0));
        let mut llm = real_span("llm", Some("root"), at(10, 1));
        llm.span_type = SpanType::Llm;
        llm.total_cost = 0.03;
        llm.total_tokens = 30;

        let merged = merge_span_update(vec![root], llm);
        let root = merged.iter().find(|s| s.span_id == "root").unwrap();
        let agg = root.aggregated.unwrap();
        assert!(agg.has_llm_descendants);
        assert!((agg.total_cost - 0.03).abs() < 1e-9);
    }

    #[test]
    fn test_unique_ids_after_merge() {
        let mut spans = Vec::new();
        for id in ["a", "b", "a", "c", "b"] {
            spans = merge_span_update(spans, real_span(id, None, at(10, 0)));
        }
        let mut ids: Vec<_> = spans.iter().map(|s| s.span_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), spans.len());
    }

    fn summary(start: DateTime<Utc>) -> TraceSummary {
        TraceSummary {
            trace_id: "t".into(),
            name: None,
            start_time: start,
            end_time: None,
            total_tokens: 0,
            total_cost: 0.0,
            span_count: 0,
            has_browser_session: false,
        }
    }

    #[test]
    fn test_trace_aggregate_widens_monotonically() {
        let mut trace = summary(at(10, 0));

        let mut first = real_span("a", None, at(10, 0));
        first.end_time = at(10, 5);
        first.total_tokens = 100;
        first.total_cost = 0.01;
        widen_trace_aggregate(&mut trace, &first, None);

        assert_eq!(trace.end_time, Some(at(10, 5)));
        assert_eq!(trace.total_tokens, 100);
        assert_eq!(trace.span_count, 1);

        // Earlier start widens the window backwards; counters never shrink
        let mut earlier = real_span("b", None, at(9, 58));
        earlier.end_time = at(10, 2);
        earlier.total_tokens = 50;
        widen_trace_aggregate(&mut trace, &earlier, None);

        assert_eq!(trace.start_time, at(9, 58));
        assert_eq!(trace.end_time, Some(at(10, 5)));
        assert_eq!(trace.total_tokens, 150);
    }

    #[test]
    fn test_trace_aggregate_no_double_count_on_replace() {
        let mut trace = summary(at(10, 0));

        let mut v1 = real_span("a", None, at(10, 0));
        v1.total_tokens = 100;
        v1.total_cost = 0.01;
        widen_trace_aggregate(&mut trace, &v1, None);

        let mut v2 = v1.clone();
        v2.total_tokens = 140;
        v2.total_cost = 0.015;
        widen_trace_aggregate(&mut trace, &v2, Some(&v1));

        assert_eq!(trace.total_tokens, 140);
        assert!((trace.total_cost - 0.015).abs() < 1e-9);
        assert_eq!(trace.span_count, 1);
    }
}
