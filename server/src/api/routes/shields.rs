//! Shield passthrough endpoints

use axum::Json;
use axum::extract::State;
use axum::response::Response;
use reqwest::Method;
use serde_json::Value as JsonValue;

use super::passthrough::forward;
use super::ApiState;
use crate::api::extractors::ResourcePath;
use crate::api::types::ApiError;

/// List shields
#[utoipa::path(
    get,
    path = "/api/v1/shields",
    tag = "shields",
    responses((status = 200, description = "Shields as returned by the analysis backend"))
)]
pub async fn list_shields(State(state): State<ApiState>) -> Result<Response, ApiError> {
    forward(&state, Method::GET, "/shields".to_string(), None).await
}

/// Create a shield
#[utoipa::path(
    post,
    path = "/api/v1/shields",
    tag = "shields",
    responses((status = 201, description = "Created shield"))
)]
pub async fn create_shield(
    State(state): State<ApiState>,
    Json(body): Json<JsonValue>,
) -> Result<Response, ApiError> {
    forward(&state, Method::POST, "/shields".to_string(), Some(body)).await
}

/// Get a shield
#[utoipa::path(
    get,
    path = "/api/v1/shields/{id}",
    tag = "shields",
    params(("id" = String, Path, description = "Shield ID")),
    responses((status = 200, description = "Shield"))
)]
pub async fn get_shield(
    State(state): State<ApiState>,
    ResourcePath { id }: ResourcePath,
) -> Result<Response, ApiError> {
    forward(&state, Method::GET, format!("/shields/{id}"), None).await
}

/// Update a shield
#[utoipa::path(
    put,
    path = "/api/v1/shields/{id}",
    tag = "shields",
    params(("id" = String, Path, description = "Shield ID")),
    responses((status = 200, description = "Updated shield"))
)]
pub async fn update_shield(
    State(state): State<ApiState>,
    ResourcePath { id }: ResourcePath,
    Json(body): Json<JsonValue>,
) -> Result<Response, ApiError> {
    forward(&state, Method::PUT, format!("/shields/{id}"), Some(body)).await
}

/// Delete a shield
#[utoipa::path(
    delete,
    path = "/api/v1/shields/{id}",
    tag = "shields",
    params(("id" = String, Path, description = "Shield ID")),
    responses((status = 204, description = "Shield deleted"))
)]
pub async fn delete_shield(
    State(state): State<ApiState>,
    ResourcePath { id }: ResourcePath,
) -> Result<Response, ApiError> {
    forward(&state, Method::DELETE, format!("/shields/{id}"), None).await
}
