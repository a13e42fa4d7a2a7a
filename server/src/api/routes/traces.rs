//! Trace view endpoints
//!
//! The span listing is the load half of the view pipeline: fetch from the
//! analysis backend, materialize (synthesize, sort, aggregate), resolve the
//! selection, start the realtime forwarder, and hand the whole view state to
//! the UI in one response.

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::ApiState;
use crate::api::extractors::{TracePath, ValidatedQuery};
use crate::api::types::{ApiError, parse_timestamp_param};
use crate::domain::tree::span::{SpanRecord, SpanRef};
use crate::domain::tree::virtual_span::{VirtualSpan, virtual_spans};
use crate::upstream::{SpanQuery, TraceSummary};

/// Hard cap on spans materialized per view; the backend feed is paginated
/// but a runaway trace must not exhaust the dashboard
pub const MAX_SPANS_PER_VIEW: usize = 2500;

#[derive(Debug, Deserialize, Validate, IntoParams)]
pub struct TraceSpansQuery {
    /// Free-text search forwarded to the backend
    #[validate(length(max = 512, message = "search must be at most 512 characters"))]
    pub search: Option<String>,
    /// Field scope for the search (backend-defined)
    #[validate(length(max = 64, message = "search_in must be at most 64 characters"))]
    pub search_in: Option<String>,
    #[validate(length(max = 512, message = "filter must be at most 512 characters"))]
    pub filter: Option<String>,
    /// RFC 3339 lower bound
    pub start_date: Option<String>,
    /// RFC 3339 upper bound
    pub end_date: Option<String>,
    /// Explicit selection: a span id, possibly in synthetic string form
    #[validate(length(max = 512, message = "span must be at most 512 characters"))]
    pub span: Option<String>,
    /// Remembered selection path, comma-separated span names
    #[validate(length(max = 2048, message = "path must be at most 2048 characters"))]
    pub path: Option<String>,
}

/// Everything the viewer renders for one open trace
#[derive(Debug, Serialize, ToSchema)]
pub struct TraceViewResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceSummary>,
    pub spans: Vec<SpanRecord>,
    pub virtual_spans: Vec<VirtualSpan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_span_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReleaseViewResponse {
    pub released: bool,
}

/// Trace summary
#[utoipa::path(
    get,
    path = "/api/v1/traces/{trace_id}",
    tag = "traces",
    params(("trace_id" = String, Path, description = "Trace ID")),
    responses(
        (status = 200, description = "Trace summary", body = TraceSummary),
        (status = 404, description = "Trace not found"),
        (status = 502, description = "Analysis backend unavailable")
    )
)]
pub async fn get_trace(
    State(state): State<ApiState>,
    TracePath { trace_id }: TracePath,
) -> Result<Json<TraceSummary>, ApiError> {
    // A live view's widened summary is fresher than anything cached
    if let Some(store) = state.registry.get(&trace_id)
        && let Some(trace) = store.snapshot().trace
    {
        return Ok(Json(trace));
    }

    if let Some(cached) = state.summaries.get(&trace_id).await {
        return Ok(Json(cached));
    }

    let summary = state
        .client
        .get_trace(&trace_id)
        .await
        .map_err(ApiError::from_upstream)?;
    state.summaries.insert(summary.clone()).await;
    Ok(Json(summary))
}

/// Materialized span tree for a trace
#[utoipa::path(
    get,
    path = "/api/v1/traces/{trace_id}/spans",
    tag = "traces",
    params(
        ("trace_id" = String, Path, description = "Trace ID"),
        TraceSpansQuery
    ),
    responses(
        (status = 200, description = "Materialized trace view", body = TraceViewResponse),
        (status = 404, description = "Trace not found"),
        (status = 502, description = "Analysis backend unavailable")
    )
)]
pub async fn get_trace_spans(
    State(state): State<ApiState>,
    TracePath { trace_id }: TracePath,
    ValidatedQuery(query): ValidatedQuery<TraceSpansQuery>,
) -> Result<Json<TraceViewResponse>, ApiError> {
    let span_query = SpanQuery {
        search: query.search.clone(),
        search_in: query.search_in.clone(),
        filter: query.filter.clone(),
        start_date: parse_timestamp_param(&query.start_date)?,
        end_date: parse_timestamp_param(&query.end_date)?,
    };

    let store = state.registry.get_or_create(&trace_id);
    let epoch = store.begin_load();

    // Summary and spans come from different endpoints; a missing summary
    // degrades the header, a failed span fetch fails the whole view.
    let trace = match state.summaries.get(&trace_id).await {
        Some(cached) => Some(cached),
        None => match state.client.get_trace(&trace_id).await {
            Ok(summary) => {
                state.summaries.insert(summary.clone()).await;
                Some(summary)
            }
            Err(e) => {
                tracing::warn!(trace_id, error = %e, "Trace summary fetch failed");
                None
            }
        },
    };

    let raw = match state.client.get_spans(&trace_id, &span_query).await {
        Ok(raw) => raw,
        Err(e) => {
            let api_error = ApiError::from_upstream(e);
            store.finish_load(epoch, Err("span fetch failed".to_string()));
            return Err(api_error);
        }
    };

    let mut raw = raw;
    if raw.len() > MAX_SPANS_PER_VIEW {
        tracing::warn!(
            trace_id,
            total = raw.len(),
            cap = MAX_SPANS_PER_VIEW,
            "Span set truncated for view"
        );
        raw.truncate(MAX_SPANS_PER_VIEW);
    }

    let spans = raw.into_iter().map(|r| r.normalize()).collect();
    store.finish_load(epoch, Ok((trace, spans)));

    let explicit = query.span.as_deref().map(SpanRef::parse);
    let remembered: Option<Vec<String>> = query.path.as_deref().map(|p| {
        p.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    });
    if explicit.is_some() || remembered.is_some() {
        store.apply_selection(explicit.as_ref(), remembered.as_deref());
    }

    state.live.ensure_forwarder(&trace_id);

    let snapshot = store.snapshot();
    let virtual_rows = virtual_spans(&snapshot.spans);
    Ok(Json(TraceViewResponse {
        trace: snapshot.trace,
        spans: snapshot.spans,
        virtual_spans: virtual_rows,
        selected_span_id: snapshot.selected_span_id,
    }))
}

/// Tear down the trace view
#[utoipa::path(
    delete,
    path = "/api/v1/traces/{trace_id}/view",
    tag = "traces",
    params(("trace_id" = String, Path, description = "Trace ID")),
    responses(
        (status = 200, description = "View released", body = ReleaseViewResponse)
    )
)]
pub async fn release_view(
    State(state): State<ApiState>,
    TracePath { trace_id }: TracePath,
) -> Result<Json<ReleaseViewResponse>, ApiError> {
    let released = state.live.release(&trace_id);
    state.summaries.invalidate(&trace_id).await;
    if released {
        tracing::debug!(trace_id, "Trace view released");
    }
    Ok(Json(ReleaseViewResponse { released }))
}
