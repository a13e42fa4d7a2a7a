//! Path and validation extractors for API routes

use std::ops::Deref;

use axum::Json;
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::extract::{FromRequestParts, Path, Query};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use validator::Validate;

use super::types::MAX_ID_LENGTH;

/// Validate generic ID length (trace_id, span_id, policy_id, etc.)
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.len() <= MAX_ID_LENGTH
}

/// Raw path extractor for trace routes (internal use)
#[derive(Debug, Deserialize)]
struct TracePathRaw {
    trace_id: String,
}

/// Validated trace path extractor.
///
/// Extracts and validates `trace_id` from URL path parameters.
/// Returns a 400 Bad Request if validation fails.
#[derive(Debug)]
pub struct TracePath {
    pub trace_id: String,
}

impl<S> FromRequestParts<S> for TracePath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<TracePathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_id(&raw.trace_id) {
            return Err(ValidationRejection::InvalidTraceId);
        }

        Ok(Self {
            trace_id: raw.trace_id,
        })
    }
}

/// Raw path extractor for resource routes (internal use)
#[derive(Debug, Deserialize)]
struct ResourcePathRaw {
    id: String,
}

/// Validated id path extractor for policy/shield passthrough routes
#[derive(Debug)]
pub struct ResourcePath {
    pub id: String,
}

impl<S> FromRequestParts<S> for ResourcePath
where
    S: Send + Sync,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<ResourcePathRaw>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Path)?;

        if !is_valid_id(&raw.id) {
            return Err(ValidationRejection::InvalidResourceId);
        }

        Ok(Self { id: raw.id })
    }
}

/// Validation rejection with structured error response
pub enum ValidationRejection {
    /// Failed to parse path parameters
    Path(PathRejection),
    /// Invalid trace_id format
    InvalidTraceId,
    /// Invalid resource id format
    InvalidResourceId,
    /// Failed to parse query string
    Query(QueryRejection),
    /// Validation constraints not satisfied
    Validation(validator::ValidationErrors),
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Path(rejection) => (
                StatusCode::BAD_REQUEST,
                "PATH_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::InvalidTraceId => (
                StatusCode::BAD_REQUEST,
                "INVALID_TRACE_ID",
                "Invalid trace_id: must be 1-256 characters".to_string(),
            ),
            Self::InvalidResourceId => (
                StatusCode::BAD_REQUEST,
                "INVALID_ID",
                "Invalid id: must be 1-256 characters".to_string(),
            ),
            Self::Query(rejection) => (
                StatusCode::BAD_REQUEST,
                "QUERY_PARSE_ERROR",
                rejection.body_text(),
            ),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format_validation_errors(&errors),
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": "bad_request",
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}

fn format_validation_errors(errors: &validator::ValidationErrors) -> String {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{}: validation failed", field))
            })
        })
        .collect::<Vec<_>>()
        .join("; ")
}

/// Query extractor with automatic validation.
///
/// Deserializes query parameters and validates them using the `validator`
/// crate. Returns a `ValidationRejection` on parse or validation failure.
#[derive(Debug)]
pub struct ValidatedQuery<T>(pub T);

impl<T> Deref for ValidatedQuery<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ValidationRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(ValidationRejection::Query)?;
        value.validate().map_err(ValidationRejection::Validation)?;
        Ok(Self(value))
    }
}

