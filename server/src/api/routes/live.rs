//! SSE endpoint for live trace updates
//!
//! Subscribes to the per-trace broadcast topic fed by the forwarder task and
//! streams materialized view updates to the dashboard. Backpressure follows
//! the rate-cap pattern: above the per-second budget, intermediate updates
//! are dropped; each one that survives carries the full materialized set, so
//! dropping is lossless for the final picture.

use std::convert::Infallible;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures::stream::Stream;

use super::ApiState;
use crate::api::extractors::TracePath;
use crate::api::types::ApiError;
use crate::data::topics::TopicError;
use crate::domain::live::topic_name;

/// Live updates for one trace
#[utoipa::path(
    get,
    path = "/api/v1/traces/{trace_id}/live",
    tag = "traces",
    params(("trace_id" = String, Path, description = "Trace ID")),
    responses(
        (status = 200, description = "SSE stream of materialized view updates")
    )
)]
pub async fn live(
    State(state): State<ApiState>,
    TracePath { trace_id }: TracePath,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    state.live.ensure_forwarder(&trace_id);
    let mut subscriber = state.live.topics().subscribe(&topic_name(&trace_id));
    let mut shutdown_rx = state.shutdown_rx.clone();
    let max_per_second = state.live_max_events_per_second.max(1);

    let stream = async_stream::stream! {
        let mut events_this_second: u32 = 0;
        let mut second_start = Instant::now();
        let mut dropped_count: u64 = 0;

        loop {
            tokio::select! {
                biased;
                // Check for shutdown signal first
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        // Notify client before closing so it can reconnect immediately
                        yield Ok(Event::default().event("terminate").data("shutdown"));
                        break;
                    }
                }
                result = subscriber.recv() => {
                    match result {
                        Ok(update) => {
                            if second_start.elapsed() >= Duration::from_secs(1) {
                                if dropped_count > 0 {
                                    tracing::debug!(dropped = dropped_count, "SSE updates dropped due to rate limit");
                                }
                                events_this_second = 0;
                                dropped_count = 0;
                                second_start = Instant::now();
                            }

                            if events_this_second >= max_per_second {
                                dropped_count += 1;
                                continue;
                            }

                            match serde_json::to_string(&update) {
                                Ok(data) => {
                                    events_this_second += 1;
                                    yield Ok(Event::default()
                                        .event("span")
                                        .data(data));
                                }
                                Err(e) => {
                                    tracing::error!(error = %e, "Failed to serialize SSE update");
                                }
                            }
                        }
                        Err(TopicError::Lagged(n)) => {
                            tracing::warn!(lagged = n, "SSE subscriber lagged behind");
                        }
                        Err(TopicError::Closed) => break,
                    }
                }
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    ))
}
