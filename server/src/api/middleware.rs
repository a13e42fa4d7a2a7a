//! HTTP middleware (CORS, 404 handler)

use axum::body::to_bytes;
use axum::extract::Request;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::core::config::is_all_interfaces;

/// Allowed origins configuration
#[derive(Debug, Clone)]
pub struct AllowedOrigins {
    origins: Vec<String>,
}

impl AllowedOrigins {
    /// Create allowed origins from host and port configuration
    pub fn new(host: &str, port: u16) -> Self {
        let mut origins = Vec::new();
        // The frontend dev server conventionally runs one port up; at the
        // top of the range there is no such port.
        let dev_port = port.checked_add(1);

        // When binding to all interfaces or localhost, allow both localhost
        // and 127.0.0.1; otherwise use the configured host directly.
        let base_hosts: Vec<&str> =
            if is_all_interfaces(host) || host == "127.0.0.1" || host == "localhost" {
                vec!["localhost", "127.0.0.1"]
            } else {
                vec![host]
            };

        for h in &base_hosts {
            origins.push(format!("http://{}:{}", h, port));
            if let Some(dev_port) = dev_port {
                origins.push(format!("http://{}:{}", h, dev_port));
            }
            origins.push(format!("http://{}", h));
        }

        Self { origins }
    }

    /// Get origins as HeaderValues for CORS
    fn as_header_values(&self) -> Vec<HeaderValue> {
        self.origins.iter().filter_map(|o| o.parse().ok()).collect()
    }
}

/// Create CORS layer
pub fn cors(allowed: &AllowedOrigins) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed.as_header_values()))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            header::CACHE_CONTROL,
        ])
        .allow_credentials(true)
}

const MAX_404_BODY_LOG: usize = 64 * 1024; // 64KB limit for logging

/// Handle 404 Not Found with logging
pub async fn handle_404(req: Request) -> impl IntoResponse {
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return StatusCode::NOT_FOUND;
    }

    let method = req.method().clone();
    let uri = req.uri().clone();

    let body_bytes = match to_bytes(req.into_body(), MAX_404_BODY_LOG).await {
        Ok(bytes) => bytes,
        Err(_) => {
            tracing::debug!("[404] {} {} (failed to read body)", method, uri);
            return StatusCode::NOT_FOUND;
        }
    };

    if body_bytes.is_empty() {
        tracing::debug!("[404] {} {}", method, uri);
    } else {
        tracing::debug!("[404] {} {} ({} byte body)", method, uri, body_bytes.len());
    }

    StatusCode::NOT_FOUND
}
