//! Analysis backend client
//!
//! The dashboard talks to the remote analysis backend over plain HTTP plus
//! one SSE stream per open trace. The [`BackendClient`] trait is the seam the
//! rest of the server programs against; tests substitute a stub.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Method;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use super::types::{RawSpan, SpanQuery, SpanUpdatePayload, TraceSummary, UpstreamError};
use crate::utils::retry::{DEFAULT_BASE_DELAY_MS, DEFAULT_MAX_ATTEMPTS, retry_with_backoff_async};
use crate::utils::sse::SseParser;

/// Buffered updates per trace stream before backpressure on the reader task
const STREAM_CHANNEL_CAPACITY: usize = 256;

/// One subscribed realtime channel. Dropping it disconnects the stream.
pub struct SpanUpdateStream {
    rx: mpsc::Receiver<Result<SpanUpdatePayload, UpstreamError>>,
}

impl SpanUpdateStream {
    pub(crate) fn new(rx: mpsc::Receiver<Result<SpanUpdatePayload, UpstreamError>>) -> Self {
        Self { rx }
    }

    /// Next update batch; `None` when the backend closed the stream
    pub async fn recv(&mut self) -> Option<Result<SpanUpdatePayload, UpstreamError>> {
        self.rx.recv().await
    }
}

#[async_trait]
pub trait BackendClient: Send + Sync {
    async fn get_trace(&self, trace_id: &str) -> Result<TraceSummary, UpstreamError>;

    async fn get_spans(
        &self,
        trace_id: &str,
        query: &SpanQuery,
    ) -> Result<Vec<RawSpan>, UpstreamError>;

    /// Subscribe to the `trace_{trace_id}` realtime channel
    async fn stream_span_updates(&self, trace_id: &str)
    -> Result<SpanUpdateStream, UpstreamError>;

    /// Forward a policy/shield request verbatim and return status + body
    async fn passthrough(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<(u16, JsonValue), UpstreamError>;
}

// ============================================================================
// HTTP IMPLEMENTATION
// ============================================================================

pub struct HttpBackendClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpBackendClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req
    }

    async fn json_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        path: &str,
    ) -> Result<T, UpstreamError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                path: path.to_string(),
                body: truncate_body(&body),
            });
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Span listing envelope
#[derive(serde::Deserialize)]
struct SpanBatch {
    #[serde(default)]
    spans: Vec<RawSpan>,
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn get_trace(&self, trace_id: &str) -> Result<TraceSummary, UpstreamError> {
        let path = format!("/traces/{trace_id}");
        let response = self.request(Method::GET, &path).send().await?;
        Self::json_response(response, &path).await
    }

    async fn get_spans(
        &self,
        trace_id: &str,
        query: &SpanQuery,
    ) -> Result<Vec<RawSpan>, UpstreamError> {
        let path = format!("/traces/{trace_id}/spans");
        let response = self
            .request(Method::GET, &path)
            .query(query)
            .send()
            .await?;
        let batch: SpanBatch = Self::json_response(response, &path).await?;
        Ok(batch.spans)
    }

    async fn stream_span_updates(
        &self,
        trace_id: &str,
    ) -> Result<SpanUpdateStream, UpstreamError> {
        let path = format!("/realtime/trace_{trace_id}");

        // Only the handshake retries, and only on transient failures; a 404
        // for an unknown trace must not burn through backoff attempts. Once
        // connected, a drop is surfaced to the forwarder, which owns the
        // resubscribe decision.
        let response = retry_with_backoff_async(
            DEFAULT_MAX_ATTEMPTS,
            DEFAULT_BASE_DELAY_MS,
            || {
                let req = self
                    .request(Method::GET, &path)
                    .header("Accept", "text/event-stream");
                let path = path.clone();
                async move {
                    let response = req.send().await.map_err(UpstreamError::Http)?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(UpstreamError::Status {
                            status: status.as_u16(),
                            path,
                            body: String::new(),
                        });
                    }
                    Ok(response)
                }
            },
            UpstreamError::is_transient,
        )
        .await
        .map_err(|(e, _)| e)?;

        let (tx, rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let trace_id = trace_id.to_string();
        tokio::spawn(async move {
            read_stream(response, &trace_id, tx).await;
        });

        Ok(SpanUpdateStream::new(rx))
    }

    async fn passthrough(
        &self,
        method: Method,
        path: &str,
        body: Option<JsonValue>,
    ) -> Result<(u16, JsonValue), UpstreamError> {
        let mut req = self.request(method, path);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let body = if text.is_empty() {
            JsonValue::Null
        } else {
            serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
        };
        Ok((status, body))
    }
}

/// Pump the SSE byte stream into parsed `span_update` payloads
async fn read_stream(
    response: reqwest::Response,
    trace_id: &str,
    tx: mpsc::Sender<Result<SpanUpdatePayload, UpstreamError>>,
) {
    let mut parser = SseParser::new();
    let mut bytes = response.bytes_stream();

    while let Some(chunk) = bytes.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx
                    .send(Err(UpstreamError::StreamClosed {
                        trace_id: trace_id.to_string(),
                        reason: e.to_string(),
                    }))
                    .await;
                return;
            }
        };

        for event in parser.push(&chunk) {
            if event.event != "span_update" {
                continue;
            }
            let parsed = serde_json::from_str::<SpanUpdatePayload>(&event.data);
            let message = match parsed {
                Ok(payload) => Ok(payload),
                Err(e) => {
                    tracing::debug!(trace_id, error = %e, "Skipping malformed span_update");
                    continue;
                }
            };
            if tx.send(message).await.is_err() {
                // Subscriber dropped the stream handle
                return;
            }
        }
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 512;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let client =
            HttpBackendClient::new("http://backend:9000/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(client.base_url, "http://backend:9000");
    }

    #[test]
    fn test_truncate_body_short_unchanged() {
        assert_eq!(truncate_body("oops"), "oops");
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let body = "é".repeat(600);
        let out = truncate_body(&body);
        assert!(out.len() <= 512 + '…'.len_utf8());
        assert!(out.ends_with('…'));
    }

    #[test]
    fn test_span_batch_envelope_defaults_empty() {
        let batch: SpanBatch = serde_json::from_str("{}").unwrap();
        assert!(batch.spans.is_empty());
    }
}
