//! REST API server module
//!
//! Provides an OpenAPI 3.1 compliant REST API for starting scrape jobs,
//! following their progress over SSE, and managing the credential tier.

use axum::{
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{Orchestrator, Result};

pub mod auth;
pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Scrape Jobs
/// - `POST /scrape` - Start a scrape job (202 Accepted)
/// - `GET /scrape` - List known jobs
/// - `GET /scrape/:id` - Job snapshot
/// - `GET /scrape/:id/events` - SSE progress stream (replay, then live)
/// - `GET /scrape/:id/result` - Wait for the result (`?timeout_secs=N`)
/// - `POST /scrape/:id/cancel` - Request cancellation (always 200)
///
/// ## Authentication
/// - `GET /auth/status` - Current tier report
/// - `POST /auth/full` - Store a full-session cookie bundle
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
pub fn create_router(orchestrator: Orchestrator) -> Router {
    let config = orchestrator.config().clone();
    let state = AppState::new(orchestrator);

    let router = Router::new()
        // Scrape jobs
        .route("/scrape", post(routes::start_scrape))
        .route("/scrape", get(routes::list_jobs))
        .route("/scrape/:id", get(routes::get_job))
        .route("/scrape/:id/events", get(routes::job_events))
        .route("/scrape/:id/result", get(routes::get_result))
        .route("/scrape/:id/cancel", post(routes::cancel_job))
        // Authentication
        .route("/auth/status", get(routes::auth_status))
        .route("/auth/full", post(routes::setup_full_auth))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec));

    // Merge Swagger UI routes if enabled (before applying state)
    // Note: SwaggerUi serves its own copy of the spec document
    let router = if config.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api/v1/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state);

    // Middleware layer ordering: in Axum's onion model the LAST layer
    // applied is the OUTERMOST (runs first on requests). Auth goes on
    // before CORS so CORS preflights are answered even without a key.
    let router = if config.api.api_key.is_some() {
        router.layer(middleware::from_fn_with_state(
            config.api.api_key.clone(),
            auth::require_api_key,
        ))
    } else {
        router
    };

    if config.api.cors_enabled {
        let cors = build_cors_layer(&config.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// Supports "*" for any origin; invalid origin strings are skipped.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address
///
/// Binds a TCP listener and serves the router; runs until the server is
/// shut down.
///
/// # Example
///
/// ```no_run
/// use scrapeflow::{Config, Orchestrator};
/// use scrapeflow::auth::HttpLivenessProbe;
/// use std::sync::Arc;
///
/// # async fn example(driver: Arc<dyn scrapeflow::driver::ScrapeDriver>) -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::default();
/// let probe = Arc::new(HttpLivenessProbe::new(&config.probe)?);
/// let orchestrator = Orchestrator::new(config, driver, probe);
///
/// // Start API server (blocks until shutdown)
/// scrapeflow::api::start_api_server(orchestrator).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(orchestrator: Orchestrator) -> Result<()> {
    let bind_address = orchestrator.config().api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(orchestrator);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
