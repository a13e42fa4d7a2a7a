//! Bottom-up metric aggregation
//!
//! Rolls token/cost totals up from LLM spans to their non-LLM ancestors so
//! container rows (agents, chains) can display subtree cost. Reads only
//! own-span metric values, never previously computed rollups, which makes the
//! pass idempotent.

use rustc_hash::FxHashMap;

use super::span::{AggregatedMetrics, SpanRecord};

#[derive(Debug, Clone, Copy, Default)]
struct Rollup {
    has_llm: bool,
    total_cost: f64,
    total_tokens: i64,
}

/// Recompute `aggregated` for every span in the set.
///
/// A metric-bearing span keeps its own values (`aggregated` stays `None`); a
/// non-metric-bearing span with LLM descendants gets the sum over all of them,
/// direct and transitive. Malformed parent references that form a cycle are
/// broken at the back edge rather than looping.
pub fn aggregate_metrics(spans: &mut [SpanRecord]) {
    let index: FxHashMap<&str, usize> = spans
        .iter()
        .enumerate()
        .map(|(i, s)| (s.span_id.as_str(), i))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); spans.len()];
    for (i, span) in spans.iter().enumerate() {
        if let Some(parent) = span.parent_span_id.as_deref()
            && let Some(&p) = index.get(parent)
            && p != i
        {
            children[p].push(i);
        }
    }

    let mut memo: Vec<Option<Rollup>> = vec![None; spans.len()];
    let mut in_stack = vec![false; spans.len()];
    let rollups: Vec<Rollup> = (0..spans.len())
        .map(|i| subtree_rollup(i, spans, &children, &mut memo, &mut in_stack))
        .collect();

    for (span, rollup) in spans.iter_mut().zip(rollups) {
        span.aggregated = if !span.span_type.is_metric_bearing() && rollup.has_llm {
            Some(AggregatedMetrics {
                has_llm_descendants: true,
                total_cost: rollup.total_cost,
                total_tokens: rollup.total_tokens,
            })
        } else {
            None
        };
    }
}

/// Rollup over the strict descendants of `idx` (the node's own metrics are
/// the parent's concern, not its own).
fn subtree_rollup(
    idx: usize,
    spans: &[SpanRecord],
    children: &[Vec<usize>],
    memo: &mut Vec<Option<Rollup>>,
    in_stack: &mut Vec<bool>,
) -> Rollup {
    if let Some(cached) = memo[idx] {
        return cached;
    }
    if in_stack[idx] {
        // Back edge from malformed parent ids; contribute nothing
        return Rollup::default();
    }
    in_stack[idx] = true;

    let mut rollup = Rollup::default();
    for &child in &children[idx] {
        let c = &spans[child];
        if c.span_type.is_metric_bearing() {
            rollup.has_llm = true;
            rollup.total_cost += c.total_cost;
            rollup.total_tokens += c.total_tokens;
        }
        let nested = subtree_rollup(child, spans, children, memo, in_stack);
        rollup.has_llm |= nested.has_llm;
        rollup.total_cost += nested.total_cost;
        rollup.total_tokens += nested.total_tokens;
    }

    in_stack[idx] = false;
    memo[idx] = Some(rollup);
    rollup
}
