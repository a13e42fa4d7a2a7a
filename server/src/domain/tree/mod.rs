//! Trace tree materialization engine.
//!
//! Turns the analysis backend's lazily-paginated, possibly-incomplete span
//! feed into a consistent tree: missing ancestors are synthesized as pending
//! placeholders, the set stays sorted and id-unique, metrics roll up from LLM
//! descendants, and realtime updates fold in without breaking any of that.

pub mod aggregate;
pub mod merge;
pub mod select;
pub mod span;
pub mod store;
pub mod synthesize;
pub mod virtual_span;

pub use merge::{materialize, merge_span_update};
pub use select::resolve_selection;
pub use span::{SpanRecord, SpanRef, SpanStatus, SpanType, SyntheticKind};
pub use store::{TraceViewRegistry, TraceViewStore, ViewState};
pub use virtual_span::{VirtualSpan, virtual_spans};
