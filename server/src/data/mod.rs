//! Data layer
//!
//! Process-local infrastructure under the domain:
//! - `topics` - In-memory broadcast fan-out for realtime updates
//! - `cache` - Short-TTL cache for upstream trace summaries

pub mod cache;
pub mod topics;

pub use cache::SummaryCache;
pub use topics::{TopicError, TopicService, TopicSubscriber};
