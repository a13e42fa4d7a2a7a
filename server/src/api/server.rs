//! API server initialization

use std::net::SocketAddr;

use anyhow::Result;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::response::Redirect;
use axum::routing::{delete, get};
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

use super::middleware::{self, AllowedOrigins};
use super::openapi::{openapi_json, swagger_ui_html};
use super::routes::{ApiState, health, live, policies, shields, traces};
use crate::core::CoreApp;
use crate::core::constants::DEFAULT_BODY_LIMIT;

pub struct ApiServer {
    app: CoreApp,
    allowed_origins: AllowedOrigins,
}

impl ApiServer {
    pub fn new(app: CoreApp) -> Self {
        let allowed_origins = AllowedOrigins::new(&app.config.server.host, app.config.server.port);

        Self {
            app,
            allowed_origins,
        }
    }

    /// Returns CoreApp for graceful shutdown
    pub async fn start(self) -> Result<CoreApp> {
        let Self {
            app,
            allowed_origins,
        } = self;

        // Clone shutdown before moving app
        let shutdown = app.shutdown.clone();

        let host = app.config.server.host.clone();
        let port = app.config.server.port;
        let addr = SocketAddr::new(host.parse()?, port);

        let state = ApiState {
            client: app.client.clone(),
            registry: app.registry.clone(),
            live: app.live.clone(),
            summaries: app.summaries.clone(),
            shutdown_rx: app.shutdown.subscribe(),
            live_max_events_per_second: app.config.live.max_events_per_second,
        };

        let router = Router::new()
            .route("/", get(|| async { Redirect::temporary("/api/docs") }))
            .route("/api/v1/health", get(health::health))
            .route("/api/openapi.json", get(openapi_json))
            .route("/api/docs", get(swagger_ui_html))
            .route("/api/docs/", get(swagger_ui_html))
            .route("/api/v1/traces/{trace_id}", get(traces::get_trace))
            .route(
                "/api/v1/traces/{trace_id}/spans",
                get(traces::get_trace_spans),
            )
            .route("/api/v1/traces/{trace_id}/live", get(live::live))
            .route(
                "/api/v1/traces/{trace_id}/view",
                delete(traces::release_view),
            )
            .route(
                "/api/v1/policies",
                get(policies::list_policies).post(policies::create_policy),
            )
            .route(
                "/api/v1/policies/{id}",
                get(policies::get_policy)
                    .put(policies::update_policy)
                    .delete(policies::delete_policy),
            )
            .route(
                "/api/v1/shields",
                get(shields::list_shields).post(shields::create_shield),
            )
            .route(
                "/api/v1/shields/{id}",
                get(shields::get_shield)
                    .put(shields::update_shield)
                    .delete(shields::delete_shield),
            )
            .with_state(state)
            .fallback(middleware::handle_404)
            .layer(CompressionLayer::new())
            .layer(middleware::cors(&allowed_origins))
            .layer(DefaultBodyLimit::max(DEFAULT_BODY_LIMIT));

        // Per-request logging only in debug mode, it is noisy under load
        let router = if app.config.debug {
            router.layer(TraceLayer::new_for_http())
        } else {
            router
        };

        let listener = TcpListener::bind(addr).await?;
        tracing::debug!(address = %addr, "API server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown.wait())
            .await?;

        Ok(app)
    }
}
