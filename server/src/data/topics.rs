//! In-memory broadcast topics
//!
//! Fire-and-forget fan-out from the per-trace forwarder tasks to however
//! many dashboard SSE connections are watching the same trace. One topic per
//! open trace, named `trace_{trace_id}`; slow subscribers lag and are told
//! how much they missed rather than stalling the publisher.

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::broadcast;

/// Channel capacity for new topics
const DEFAULT_TOPIC_CAPACITY: usize = 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TopicError {
    #[error("Subscriber lagged, {0} messages dropped")]
    Lagged(u64),
    #[error("Topic closed")]
    Closed,
}

/// Hands out broadcast topics by name
pub struct TopicService<T> {
    topics: DashMap<String, broadcast::Sender<T>>,
    capacity: usize,
}

impl<T: Clone + Send + 'static> Default for TopicService<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + 'static> TopicService<T> {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity,
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<T> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .value()
            .clone()
    }

    /// Publish to a topic. Returns how many subscribers received it;
    /// zero subscribers is not an error.
    pub fn publish(&self, topic: &str, message: T) -> usize {
        self.sender(topic).send(message).unwrap_or(0)
    }

    pub fn subscribe(&self, topic: &str) -> TopicSubscriber<T> {
        TopicSubscriber {
            rx: self.sender(topic).subscribe(),
        }
    }

    /// Drop a topic; existing subscribers observe `Closed` once drained
    pub fn remove(&self, topic: &str) {
        self.topics.remove(topic);
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

pub struct TopicSubscriber<T> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone> TopicSubscriber<T> {
    pub async fn recv(&mut self) -> Result<T, TopicError> {
        match self.rx.recv().await {
            Ok(message) => Ok(message),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(TopicError::Lagged(n)),
            Err(broadcast::error::RecvError::Closed) => Err(TopicError::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let service = TopicService::new();
        let mut sub = service.subscribe("trace_t1");

        assert_eq!(service.publish("trace_t1", "hello"), 1);
        let msg = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg, "hello");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let service: TopicService<&str> = TopicService::new();
        assert_eq!(service.publish("trace_t1", "nobody"), 0);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let service = TopicService::new();
        let mut a = service.subscribe("trace_a");
        let mut b = service.subscribe("trace_b");

        service.publish("trace_a", 1);
        assert_eq!(a.recv().await.unwrap(), 1);
        let timeout = tokio::time::timeout(Duration::from_millis(50), b.recv()).await;
        assert!(timeout.is_err());
    }

    #[tokio::test]
    async fn test_lagged_subscriber_reports_drop_count() {
        let service = TopicService::with_capacity(2);
        let mut sub = service.subscribe("t");

        for i in 0..5 {
            service.publish("t", i);
        }
        assert_eq!(sub.recv().await, Err(TopicError::Lagged(3)));
        assert_eq!(sub.recv().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_removed_topic_closes_subscribers() {
        let service: TopicService<u32> = TopicService::new();
        let mut sub = service.subscribe("t");
        service.remove("t");
        assert_eq!(sub.recv().await, Err(TopicError::Closed));
    }

    #[tokio::test]
    async fn test_subscriber_count() {
        let service: TopicService<u32> = TopicService::new();
        assert_eq!(service.subscriber_count("t"), 0);
        let _a = service.subscribe("t");
        let _b = service.subscribe("t");
        assert_eq!(service.subscriber_count("t"), 2);
    }
}
