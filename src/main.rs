mod cache_integrity;
mod certificate;
mod circuit_breaker;
mod climate;
mod config;
mod errors;
mod evaluation;
mod handlers;
mod land_change;
mod loan;
mod models;
mod narrative;
mod policy;
mod scoring;
mod series;
mod services;
mod trend;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::narrative::NarrativeClient;
use crate::services::{
    ArchiveClimateService, CatalogImageryService, ClimateSource, ImagerySource,
    MockClimateService, MockImageryService,
};

/// Serves the OpenAPI specification YAML file.
///
/// This endpoint reads the `openapi.yml` file from the filesystem and serves it
/// with the appropriate content type. If the file is not found, it returns a 404 error.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found.").into_response(),
    }
}

/// Serves the Swagger UI HTML page.
///
/// This endpoint returns an HTML page that embeds the Swagger UI, configured to
/// load the OpenAPI specification served by `serve_openapi_spec`.
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>GreenChain API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Main entry point for the application.
///
/// This function initializes the application, including:
/// - Logging and tracing.
/// - Configuration and evaluation policy loading.
/// - Imagery / climate / reasoning collaborators.
/// - Certificate cache.
/// - HTTP routes and middleware (CORS, Rate Limiting).
///
/// It then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenchain_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration and evaluation policy
    let config = Config::from_env()?;
    let policy = config.load_policy()?;

    // Imagery and climate capabilities: remote services, or deterministic
    // mocks when MOCK_PROVIDERS is set (demo mode)
    let (imagery, climate) = if config.mock_providers {
        (
            ImagerySource::Mock(MockImageryService::default()),
            ClimateSource::Mock(MockClimateService::default()),
        )
    } else {
        (
            ImagerySource::Catalog(
                CatalogImageryService::new(&config)
                    .map_err(|e| anyhow::anyhow!("Imagery client init failed: {}", e))?,
            ),
            ClimateSource::Archive(
                ArchiveClimateService::new(&config)
                    .map_err(|e| anyhow::anyhow!("Climate client init failed: {}", e))?,
            ),
        )
    };
    tracing::info!("Imagery and climate collaborators initialized");

    // Reasoning service client is optional; without it the engine attaches
    // locally assembled fallback narratives
    let narrative_client = match &config.reasoning_api_key {
        Some(key) => match NarrativeClient::new(config.reasoning_base_url.clone(), key.clone()) {
            Ok(client) => {
                tracing::info!("✓ Reasoning service client initialized");
                Some(client)
            }
            Err(e) => {
                tracing::error!("Failed to initialize reasoning client: {}", e);
                None
            }
        },
        None => None,
    };

    // Issued-certificate cache backing the export endpoint (24 hour TTL)
    let certificate_cache = Cache::builder()
        .time_to_live(Duration::from_secs(86400))
        .max_capacity(10_000)
        .build();
    tracing::info!("Certificate cache initialized");

    // Build application state
    let app_state = Arc::new(crate::handlers::AppState {
        config: config.clone(),
        policy,
        imagery,
        climate,
        narrative_client,
        certificate_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        // API Documentation
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        // Evaluation pipeline
        .route("/api/v1/evaluations", post(handlers::create_evaluation))
        // Certificate export
        .route(
            "/api/v1/certificates/:fingerprint",
            get(handlers::get_certificate),
        )
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (polygons are small)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
