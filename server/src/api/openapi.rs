//! OpenAPI specification and Swagger UI

use axum::http::header;
use axum::response::{Html, IntoResponse, Json};
use utoipa::OpenApi;

use crate::api::routes::{health, live, policies, shields, traces};
use crate::domain::live::LiveUpdate;
use crate::domain::tree::span::{
    AggregatedMetrics, FunctionAttempt, GuardEvent, SpanAttributes, SpanRecord, SpanStatus,
    SpanType, SyntheticKind,
};
use crate::domain::tree::virtual_span::VirtualSpan;
use crate::upstream::TraceSummary;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Callwarden API",
        version = env!("CARGO_PKG_VERSION"),
        description = "Dashboard backend for LLM function-call security traces"
    ),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "traces", description = "Trace view materialization and realtime updates"),
        (name = "policies", description = "Policy passthrough to the analysis backend"),
        (name = "shields", description = "Shield passthrough to the analysis backend")
    ),
    paths(
        // Health
        health::health,
        // Traces
        traces::get_trace,
        traces::get_trace_spans,
        traces::release_view,
        live::live,
        // Policies
        policies::list_policies,
        policies::create_policy,
        policies::get_policy,
        policies::update_policy,
        policies::delete_policy,
        // Shields
        shields::list_shields,
        shields::create_shield,
        shields::get_shield,
        shields::update_shield,
        shields::delete_shield,
    ),
    components(schemas(
        // Health
        health::HealthResponse,
        // Span model
        SpanRecord,
        SpanType,
        SpanStatus,
        SpanAttributes,
        GuardEvent,
        FunctionAttempt,
        AggregatedMetrics,
        SyntheticKind,
        VirtualSpan,
        // Trace view
        TraceSummary,
        LiveUpdate,
        traces::TraceViewResponse,
        traces::ReleaseViewResponse,
    ))
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
pub async fn openapi_json() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json")],
        Json(ApiDoc::openapi()),
    )
}

/// Serve Swagger UI from CDN
pub async fn swagger_ui_html() -> Html<&'static str> {
    Html(SWAGGER_UI_HTML)
}

const SWAGGER_UI_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Callwarden API Documentation</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        html { box-sizing: border-box; overflow-y: scroll; }
        *, *:before, *:after { box-sizing: inherit; }
        body { margin: 0; background: #fafafa; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = () => {
            window.ui = SwaggerUIBundle({
                url: "/api/openapi.json",
                dom_id: '#swagger-ui',
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout",
                deepLinking: true,
                showExtensions: true,
                showCommonExtensions: true
            });
        };
    </script>
</body>
</html>"#;
