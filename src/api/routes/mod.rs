//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`scrape`] — Scrape job management and progress streaming
//! - [`auth`] — Credential tier status and setup
//! - [`system`] — Health and OpenAPI

use serde::{Deserialize, Serialize};

mod auth;
mod scrape;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use auth::*;
pub use scrape::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Query parameters for GET /scrape/:id/result
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct ResultQuery {
    /// Seconds to wait for the result before answering 409 (default from config)
    pub timeout_secs: Option<u64>,
}

/// Request body for POST /auth/full
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct FullAuthRequest {
    /// Cookie bundle in `name=value; name2=value2` form
    pub cookies: String,
}

/// Response body for POST /scrape
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct StartScrapeResponse {
    /// Id of the accepted job
    pub job_id: crate::types::JobId,
    /// Initial state, always `queued`
    pub state: crate::types::JobState,
}

/// Response body for POST /scrape/:id/cancel
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct CancelResponse {
    /// Always "ok"; cancellation is idempotent
    pub status: String,
}
