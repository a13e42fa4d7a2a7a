//! Realtime forwarding
//!
//! One forwarder task per open trace: it subscribes to the backend's
//! `trace_{trace_id}` channel, folds every `span_update` through the view
//! store pipeline, and republishes the materialized result on the local
//! broadcast topic that the dashboard SSE connections consume.
//!
//! The task is scoped to the store's lifetime. It captures the store epoch at
//! subscription time; a teardown bumps the epoch and flips the stop signal,
//! so late updates are dropped and the task exits.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use crate::data::topics::TopicService;
use crate::domain::tree::span::SpanRecord;
use crate::domain::tree::store::{TraceViewRegistry, TraceViewStore};
use crate::upstream::{BackendClient, TraceSummary, UpstreamError};

/// One materialized update pushed to dashboard subscribers
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiveUpdate {
    pub trace_id: String,
    /// Full materialized span set after the merge
    pub spans: Vec<SpanRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_span_id: Option<String>,
}

pub fn topic_name(trace_id: &str) -> String {
    format!("trace_{trace_id}")
}

/// Owns the per-trace forwarder tasks
pub struct LiveService {
    client: Arc<dyn BackendClient>,
    topics: Arc<TopicService<LiveUpdate>>,
    registry: Arc<TraceViewRegistry>,
    forwarders: DashMap<String, JoinHandle<()>>,
}

impl LiveService {
    pub fn new(
        client: Arc<dyn BackendClient>,
        topics: Arc<TopicService<LiveUpdate>>,
        registry: Arc<TraceViewRegistry>,
    ) -> Self {
        Self {
            client,
            topics,
            registry,
            forwarders: DashMap::new(),
        }
    }

    pub fn topics(&self) -> &Arc<TopicService<LiveUpdate>> {
        &self.topics
    }

    /// Start the forwarder for a trace if it is not already running.
    ///
    /// A finished handle means the forwarder gave up, a failed subscribe
    /// handshake or a backend-closed stream, so it is respawned rather than
    /// left dead in the map.
    pub fn ensure_forwarder(&self, trace_id: &str) {
        match self.forwarders.entry(trace_id.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(mut entry) => {
                if !entry.get().is_finished() {
                    return;
                }
                entry.insert(self.spawn_forwarder(trace_id));
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(self.spawn_forwarder(trace_id));
            }
        }
    }

    fn spawn_forwarder(&self, trace_id: &str) -> JoinHandle<()> {
        let store = self.registry.get_or_create(trace_id);
        let client = Arc::clone(&self.client);
        let topics = Arc::clone(&self.topics);
        let trace_id = trace_id.to_string();
        tokio::spawn(async move {
            run_forwarder(client, topics, store).await;
            tracing::debug!(trace_id, "Forwarder stopped");
        })
    }

    /// Tear down the trace view: stops the forwarder, resets the store,
    /// closes the local topic.
    pub fn release(&self, trace_id: &str) -> bool {
        let existed = self.registry.release(trace_id);
        if let Some((_, handle)) = self.forwarders.remove(trace_id) {
            handle.abort();
        }
        self.topics.remove(&topic_name(trace_id));
        existed
    }

    /// Abort every forwarder, for shutdown
    pub fn stop_all(&self) {
        for entry in self.forwarders.iter() {
            entry.value().abort();
        }
        self.forwarders.clear();
    }
}

async fn run_forwarder(
    client: Arc<dyn BackendClient>,
    topics: Arc<TopicService<LiveUpdate>>,
    store: Arc<TraceViewStore>,
) {
    let trace_id = store.trace_id().to_string();
    let mut stop = store.stop_signal();
    let topic = topic_name(&trace_id);

    loop {
        let epoch = store.current_epoch();
        let mut stream = match client.stream_span_updates(&trace_id).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!(trace_id, error = %e, "Realtime subscribe failed");
                return;
            }
        };

        loop {
            tokio::select! {
                biased;

                _ = stop.changed() => return,

                update = stream.recv() => {
                    match update {
                        Some(Ok(payload)) => {
                            apply_payload(&store, &topics, &topic, epoch, payload.into_spans());
                        }
                        Some(Err(UpstreamError::StreamClosed { reason, .. })) => {
                            tracing::warn!(trace_id, reason, "Realtime stream dropped, resubscribing");
                            break;
                        }
                        Some(Err(e)) => {
                            tracing::warn!(trace_id, error = %e, "Realtime stream error");
                            break;
                        }
                        None => {
                            tracing::debug!(trace_id, "Realtime stream ended");
                            return;
                        }
                    }
                }
            }
        }
    }
}

fn apply_payload(
    store: &TraceViewStore,
    topics: &TopicService<LiveUpdate>,
    topic: &str,
    epoch: u64,
    spans: Vec<crate::upstream::RawSpan>,
) {
    let mut latest = None;
    for raw in spans {
        match store.merge_update(epoch, raw.normalize()) {
            Some(state) => latest = Some(state),
            // Store was reset while this batch was in flight
            None => return,
        }
    }
    if let Some(state) = latest {
        topics.publish(
            topic,
            LiveUpdate {
                trace_id: store.trace_id().to_string(),
                spans: state.spans,
                trace: state.trace,
                selected_span_id: state.selected_span_id,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use reqwest::Method;
    use serde_json::Value as JsonValue;
    use tokio::sync::{Mutex, mpsc};

    use super::*;
    use crate::upstream::client::SpanUpdateStream;
    use crate::upstream::types::{RawSpan, SpanQuery, SpanUpdatePayload};

    struct StubBackend {
        /// Number of subscribe calls to fail before handing out the stream
        failing_subscribes: AtomicUsize,
        stream_rx: Mutex<Option<mpsc::Receiver<Result<SpanUpdatePayload, UpstreamError>>>>,
    }

    #[async_trait]
    impl BackendClient for StubBackend {
        async fn get_trace(&self, trace_id: &str) -> Result<TraceSummary, UpstreamError> {
            Err(UpstreamError::Status {
                status: 404,
                path: format!("/traces/{trace_id}"),
                body: String::new(),
            })
        }

        async fn get_spans(
            &self,
            _trace_id: &str,
            _query: &SpanQuery,
        ) -> Result<Vec<RawSpan>, UpstreamError> {
            Ok(Vec::new())
        }

        async fn stream_span_updates(
            &self,
            trace_id: &str,
        ) -> Result<SpanUpdateStream, UpstreamError> {
            if self
                .failing_subscribes
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(UpstreamError::Status {
                    status: 503,
                    path: format!("/realtime/trace_{trace_id}"),
                    body: String::new(),
                });
            }
            match self.stream_rx.lock().await.take() {
                Some(rx) => Ok(SpanUpdateStream::new(rx)),
                None => Err(UpstreamError::StreamClosed {
                    trace_id: trace_id.to_string(),
                    reason: "stub exhausted".into(),
                }),
            }
        }

        async fn passthrough(
            &self,
            _method: Method,
            _path: &str,
            _body: Option<JsonValue>,
        ) -> Result<(u16, JsonValue), UpstreamError> {
            Ok((200, JsonValue::Null))
        }
    }

    fn raw_span(id: &str) -> RawSpan {
        serde_json::from_value(serde_json::json!({
            "span_id": id,
            "start_time": "2026-03-01T10:00:00Z",
        }))
        .unwrap()
    }

    fn service_with_feed() -> (
        LiveService,
        mpsc::Sender<Result<SpanUpdatePayload, UpstreamError>>,
    ) {
        let (tx, rx) = mpsc::channel(8);
        let client = Arc::new(StubBackend {
            failing_subscribes: AtomicUsize::new(0),
            stream_rx: Mutex::new(Some(rx)),
        });
        let service = LiveService::new(
            client,
            Arc::new(TopicService::new()),
            Arc::new(TraceViewRegistry::new()),
        );
        (service, tx)
    }

    async fn wait_until_finished(service: &LiveService, trace_id: &str) {
        for _ in 0..100 {
            let finished = service
                .forwarders
                .get(trace_id)
                .map(|h| h.is_finished())
                .unwrap_or(false);
            if finished {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("forwarder for {trace_id} did not finish");
    }

    #[tokio::test]
    async fn test_forwarder_merges_and_publishes() {
        let (service, tx) = service_with_feed();
        let mut sub = service.topics().subscribe(&topic_name("t1"));
        service.ensure_forwarder("t1");

        tx.send(Ok(SpanUpdatePayload::One(Box::new(raw_span("a")))))
            .await
            .unwrap();

        let update = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.trace_id, "t1");
        assert_eq!(update.spans.len(), 1);
        assert_eq!(update.spans[0].span_id, "a");

        let store = service.registry.get("t1").unwrap();
        assert_eq!(store.snapshot().spans.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_publishes_once() {
        let (service, tx) = service_with_feed();
        let mut sub = service.topics().subscribe(&topic_name("t1"));
        service.ensure_forwarder("t1");

        tx.send(Ok(SpanUpdatePayload::Many(vec![
            raw_span("a"),
            raw_span("b"),
        ])))
        .await
        .unwrap();

        let update = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.spans.len(), 2);

        // No second publish for the same batch
        let next = tokio::time::timeout(Duration::from_millis(50), sub.recv()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_release_stops_forwarder_and_ignores_late_updates() {
        let (service, tx) = service_with_feed();
        service.ensure_forwarder("t1");
        let store = service.registry.get("t1").unwrap();

        assert!(service.release("t1"));
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The old store must not resurrect state from a late update
        let _ = tx
            .send(Ok(SpanUpdatePayload::One(Box::new(raw_span("late")))))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store.snapshot().spans.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_forwarder_is_idempotent() {
        let (service, _tx) = service_with_feed();
        service.ensure_forwarder("t1");
        service.ensure_forwarder("t1");
        assert_eq!(service.forwarders.len(), 1);
    }

    #[tokio::test]
    async fn test_forwarder_respawned_after_subscribe_failure() {
        // First subscribe fails and the forwarder exits; once the backend
        // recovers, ensure_forwarder must start a fresh one instead of
        // trusting the dead handle.
        let (tx, rx) = mpsc::channel(8);
        let client = Arc::new(StubBackend {
            failing_subscribes: AtomicUsize::new(1),
            stream_rx: Mutex::new(Some(rx)),
        });
        let service = LiveService::new(
            client,
            Arc::new(TopicService::new()),
            Arc::new(TraceViewRegistry::new()),
        );

        service.ensure_forwarder("t1");
        wait_until_finished(&service, "t1").await;

        let mut sub = service.topics().subscribe(&topic_name("t1"));
        service.ensure_forwarder("t1");

        tx.send(Ok(SpanUpdatePayload::One(Box::new(raw_span("a")))))
            .await
            .unwrap();

        let update = tokio::time::timeout(Duration::from_secs(1), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.spans.len(), 1);
        assert_eq!(update.spans[0].span_id, "a");
    }
}
