//! Domain logic for the trace viewer
//!
//! - `tree` - Trace tree materialization engine
//! - `live` - Per-trace realtime forwarding into broadcast topics

pub mod live;
pub mod tree;

pub use live::{LiveService, LiveUpdate};
pub use tree::{SpanRecord, SpanRef, TraceViewRegistry};
