//! Selection resolution
//!
//! Decides which real span the viewer should show. Synthetic row ids are
//! unstable across reloads, so a deep link or a remembered location must
//! still land on the same logical node after a refresh. Priority:
//!
//! 1. explicit reference (synthetic refs rewritten to their parent)
//! 2. remembered structural name path, matched element-for-element
//! 3. first span in sorted order

use super::span::{SpanRecord, SpanRef};

/// Resolve which span to display. Returns `None` only for an empty set.
pub fn resolve_selection<'a>(
    spans: &'a [SpanRecord],
    explicit: Option<&SpanRef>,
    remembered_path: Option<&[String]>,
) -> Option<&'a SpanRecord> {
    if let Some(r) = explicit {
        // Rule 1: a synthetic id resolves to its parent before lookup
        let id = r.real_id();
        if let Some(span) = spans.iter().find(|s| s.span_id == id) {
            return Some(span);
        }
    }

    if let Some(path) = remembered_path
        && !path.is_empty()
        && let Some(span) = spans.iter().find(|s| {
            s.attributes
                .ancestry()
                .is_some_and(|(_, names)| names == path)
        })
    {
        return Some(span);
    }

    spans.first()
}
