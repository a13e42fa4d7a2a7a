//! Trace summary cache
//!
//! Short-TTL moka cache in front of the backend's trace summary endpoint.
//! The dashboard polls summaries while a trace is open; the live merge path
//! bypasses this cache entirely (the store owns the widened summary).

use std::time::Duration;

use moka::future::Cache;

use crate::upstream::TraceSummary;

pub struct SummaryCache {
    cache: Cache<String, TraceSummary>,
}

impl SummaryCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();
        Self { cache }
    }

    pub async fn get(&self, trace_id: &str) -> Option<TraceSummary> {
        self.cache.get(trace_id).await
    }

    pub async fn insert(&self, summary: TraceSummary) {
        self.cache.insert(summary.trace_id.clone(), summary).await;
    }

    /// Drop a cached summary, e.g. when its view store is torn down
    pub async fn invalidate(&self, trace_id: &str) {
        self.cache.invalidate(trace_id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn summary(trace_id: &str) -> TraceSummary {
        TraceSummary {
            trace_id: trace_id.to_string(),
            name: None,
            start_time: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            end_time: None,
            total_tokens: 0,
            total_cost: 0.0,
            span_count: 0,
            has_browser_session: false,
        }
    }

    #[tokio::test]
    async fn test_insert_get_invalidate() {
        let cache = SummaryCache::new(16, Duration::from_secs(30));
        assert!(cache.get("t1").await.is_none());

        cache.insert(summary("t1")).await;
        assert_eq!(cache.get("t1").await.unwrap().trace_id, "t1");

        cache.invalidate("t1").await;
        assert!(cache.get("t1").await.is_none());
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = SummaryCache::new(16, Duration::from_millis(20));
        cache.insert(summary("t1")).await;
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get("t1").await.is_none());
    }
}
