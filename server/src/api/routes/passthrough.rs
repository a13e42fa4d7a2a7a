//! Shared helper for policy/shield passthrough routes
//!
//! These resources are edited by out-of-scope UI components; the dashboard
//! forwards them verbatim and relays whatever status and JSON the backend
//! returns, interpreting nothing.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use reqwest::Method;
use serde_json::Value as JsonValue;

use super::ApiState;
use crate::api::types::ApiError;

pub async fn forward(
    state: &ApiState,
    method: Method,
    path: String,
    body: Option<JsonValue>,
) -> Result<Response, ApiError> {
    let (status, body) = state
        .client
        .passthrough(method, &path, body)
        .await
        .map_err(ApiError::from_upstream)?;
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((status, Json(body)).into_response())
}
