//! Shared API types
//!
//! Error responses and small helpers used across all endpoints.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};

use crate::upstream::UpstreamError;

/// Maximum ID length for path parameters
pub const MAX_ID_LENGTH: usize = 256;

/// Parse an optional timestamp string parameter (RFC 3339 / ISO 8601 format)
pub fn parse_timestamp_param(s: &Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    match s {
        Some(ts) => DateTime::parse_from_rfc3339(ts)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|_| {
                ApiError::bad_request(
                    "INVALID_TIMESTAMP",
                    format!("Invalid timestamp format: {}. Use ISO 8601 format.", ts),
                )
            }),
        None => Ok(None),
    }
}

/// Standard API error response
#[derive(Debug)]
pub enum ApiError {
    BadRequest { code: String, message: String },
    NotFound { code: String, message: String },
    BadGateway { message: String },
    ServiceUnavailable { message: String },
    Internal { message: String },
}

impl ApiError {
    pub fn bad_request(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn not_found(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::BadGateway {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable {
            message: message.into(),
        }
    }

    /// Map an upstream failure to the user-visible error.
    ///
    /// A backend 404 is the trace not existing; anything else means the
    /// backend is unreachable or misbehaving and is reported as such, with
    /// the detail kept in the server log.
    pub fn from_upstream(e: UpstreamError) -> Self {
        match e {
            UpstreamError::Status { status: 404, .. } => Self::not_found(
                "UPSTREAM_NOT_FOUND",
                "The requested resource does not exist in the analysis backend",
            ),
            e => {
                tracing::warn!(error = %e, "Upstream request failed");
                Self::bad_gateway("The analysis backend is unavailable")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, code, message) = match self {
            Self::BadRequest { code, message } => {
                (StatusCode::BAD_REQUEST, "bad_request", code, message)
            }
            Self::NotFound { code, message } => (StatusCode::NOT_FOUND, "not_found", code, message),
            Self::BadGateway { message } => (
                StatusCode::BAD_GATEWAY,
                "bad_gateway",
                "UPSTREAM_UNAVAILABLE".to_string(),
                message,
            ),
            Self::ServiceUnavailable { message } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "SERVICE_UNAVAILABLE".to_string(),
                message,
            ),
            Self::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "INTERNAL".to_string(),
                message,
            ),
        };
        (
            status,
            Json(serde_json::json!({
                "error": error_type,
                "code": code,
                "message": message
            })),
        )
            .into_response()
    }
}
