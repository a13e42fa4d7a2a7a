//! Policy passthrough endpoints

use axum::Json;
use axum::extract::State;
use axum::response::Response;
use reqwest::Method;
use serde_json::Value as JsonValue;

use super::passthrough::forward;
use super::ApiState;
use crate::api::extractors::ResourcePath;
use crate::api::types::ApiError;

/// List policies
#[utoipa::path(
    get,
    path = "/api/v1/policies",
    tag = "policies",
    responses((status = 200, description = "Policies as returned by the analysis backend"))
)]
pub async fn list_policies(State(state): State<ApiState>) -> Result<Response, ApiError> {
    forward(&state, Method::GET, "/policies".to_string(), None).await
}

/// Create a policy
#[utoipa::path(
    post,
    path = "/api/v1/policies",
    tag = "policies",
    responses((status = 201, description = "Created policy"))
)]
pub async fn create_policy(
    State(state): State<ApiState>,
    Json(body): Json<JsonValue>,
) -> Result<Response, ApiError> {
    forward(&state, Method::POST, "/policies".to_string(), Some(body)).await
}

/// Get a policy
#[utoipa::path(
    get,
    path = "/api/v1/policies/{id}",
    tag = "policies",
    params(("id" = String, Path, description = "Policy ID")),
    responses((status = 200, description = "Policy"))
)]
pub async fn get_policy(
    State(state): State<ApiState>,
    ResourcePath { id }: ResourcePath,
) -> Result<Response, ApiError> {
    forward(&state, Method::GET, format!("/policies/{id}"), None).await
}

/// Update a policy
#[utoipa::path(
    put,
    path = "/api/v1/policies/{id}",
    tag = "policies",
    params(("id" = String, Path, description = "Policy ID")),
    responses((status = 200, description = "Updated policy"))
)]
pub async fn update_policy(
    State(state): State<ApiState>,
    ResourcePath { id }: ResourcePath,
    Json(body): Json<JsonValue>,
) -> Result<Response, ApiError> {
    forward(&state, Method::PUT, format!("/policies/{id}"), Some(body)).await
}

/// Delete a policy
#[utoipa::path(
    delete,
    path = "/api/v1/policies/{id}",
    tag = "policies",
    params(("id" = String, Path, description = "Policy ID")),
    responses((status = 204, description = "Policy deleted"))
)]
pub async fn delete_policy(
    State(state): State<ApiState>,
    ResourcePath { id }: ResourcePath,
) -> Result<Response, ApiError> {
    forward(&state, Method::DELETE, format!("/policies/{id}"), None).await
}
