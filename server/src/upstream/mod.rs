//! Remote analysis backend integration.
//!
//! The backend computes risk, severity, and quarantine decisions; none of
//! that logic lives here. This layer consumes its REST and SSE contracts and
//! normalizes wire spans into the viewer's span records.

pub mod client;
pub mod types;

pub use client::{BackendClient, HttpBackendClient, SpanUpdateStream};
pub use types::{RawSpan, SpanQuery, SpanUpdatePayload, TraceSummary, UpstreamError};
