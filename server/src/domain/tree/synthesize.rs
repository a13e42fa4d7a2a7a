//! Pending ancestor synthesis
//!
//! The backend feed is lazily paginated: a span can arrive before the
//! ancestors it references through its `ancestor_id_path` attribute. To keep
//! the tree fully connected, every referenced-but-absent ancestor gets a
//! synthesized `pending` placeholder whose time window spans all of the
//! descendants that contributed to it. Placeholders die the moment the real
//! record with the same id is merged.

use rustc_hash::{FxHashMap, FxHashSet};

use super::span::SpanRecord;

/// Fill ancestry gaps in a span set.
///
/// Idempotent: running this on its own output yields the same set. Existing
/// pending placeholders are carried forward (and widened), non-pending spans
/// are never downgraded, and malformed path attributes are treated as "no
/// gap to fill".
pub fn fill_pending_ancestors(spans: Vec<SpanRecord>) -> Vec<SpanRecord> {
    // Seed with the placeholders from the previous pass so their windows
    // carry forward instead of drifting.
    let mut pending_by_id: FxHashMap<String, SpanRecord> = spans
        .iter()
        .filter(|s| s.pending)
        .map(|s| (s.span_id.clone(), s.clone()))
        .collect();

    let real: Vec<SpanRecord> = spans.into_iter().filter(|s| !s.pending).collect();
    let real_ids: FxHashSet<&str> = real.iter().map(|s| s.span_id.as_str()).collect();

    for span in &real {
        let Some((ids, names)) = span.attributes.ancestry() else {
            continue;
        };

        // Walk the path root-first; every position the real data does not
        // cover gets (or widens) a placeholder.
        for (i, ancestor_id) in ids.iter().enumerate() {
            if ancestor_id.is_empty() || ancestor_id == &span.span_id {
                continue;
            }
            if real_ids.contains(ancestor_id.as_str()) {
                continue;
            }

            let parent = if i == 0 {
                None
            } else {
                Some(ids[i - 1].clone())
            };
            let name = names.get(i).map(String::as_str).unwrap_or(ancestor_id);

            let entry = pending_by_id.entry(ancestor_id.clone()).or_insert_with(|| {
                SpanRecord::placeholder(ancestor_id, parent, name, span.start_time, span.end_time)
            });
            // Union window: the placeholder always spans all of its descendants
            entry.start_time = entry.start_time.min(span.start_time);
            entry.end_time = entry.end_time.max(span.end_time);
        }
    }

    let mut result = real;
    // A real record with the same id always wins over a placeholder
    let placeholders: Vec<SpanRecord> = pending_by_id
        .into_values()
        .filter(|p| !result.iter().any(|s| s.span_id == p.span_id))
        .collect();
    result.extend(placeholders);
    result
}
