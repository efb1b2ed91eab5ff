//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the scrapeflow REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the scrapeflow REST API
///
/// This struct is used to generate the OpenAPI 3.1 specification that describes
/// all available endpoints, request/response types, and API behavior.
///
/// The spec can be accessed via:
/// - `/api/v1/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "scrapeflow REST API",
        version = "0.2.0",
        description = "OpenAPI 3.1 compliant REST API for managing scrape jobs, progress streaming, and authentication tiers",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:7878/api/v1", description = "Local development server")
    ),
    paths(
        // Scrape jobs
        crate::api::routes::start_scrape,
        crate::api::routes::list_jobs,
        crate::api::routes::get_job,
        crate::api::routes::job_events,
        crate::api::routes::get_result,
        crate::api::routes::cancel_job,

        // Authentication
        crate::api::routes::auth_status,
        crate::api::routes::setup_full_auth,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::JobId,
        crate::types::JobState,
        crate::types::ScrapeMode,
        crate::types::ScrapeRequest,
        crate::types::JobSnapshot,
        crate::types::EventKind,
        crate::types::ProgressEvent,
        crate::types::Profile,
        crate::types::MediaType,
        crate::types::Post,
        crate::types::AuthTier,
        crate::types::AuthStatus,
        crate::types::FaultKind,
        crate::types::ScrapeStatistics,
        crate::types::DriverInfo,
        crate::types::ScrapeResult,

        // Config types from config.rs
        crate::config::Config,
        crate::config::OrchestratorConfig,
        crate::config::ProbeConfig,
        crate::config::ApiConfig,

        // API request/response types from routes
        crate::api::routes::ResultQuery,
        crate::api::routes::FullAuthRequest,
        crate::api::routes::StartScrapeResponse,
        crate::api::routes::CancelResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "scrape", description = "Scrape jobs - Start, inspect, stream progress, wait for results, cancel"),
        (name = "auth", description = "Authentication - Credential tier status and full-session setup"),
        (name = "system", description = "System endpoints - Health checks and OpenAPI spec"),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Security addon to add API key authentication scheme to OpenAPI spec
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = &mut openapi.components {
            components.add_security_scheme(
                "api_key",
                utoipa::openapi::security::SecurityScheme::ApiKey(
                    utoipa::openapi::security::ApiKey::Header(
                        utoipa::openapi::security::ApiKeyValue::new("X-Api-Key"),
                    ),
                ),
            );
        }
    }
}
