//! Authentication handlers: tier status and full-session setup.

use axum::{extract::State, response::IntoResponse, Json};

use crate::api::AppState;
use crate::error::Result;

use super::FullAuthRequest;

/// GET /auth/status - Current authentication tier
///
/// Probes the target service on the first query per stored credential;
/// within one credential generation the classification is served from
/// cache.
#[utoipa::path(
    get,
    path = "/api/v1/auth/status",
    tag = "auth",
    responses(
        (status = 200, description = "Current tier report", body = crate::types::AuthStatus),
        (status = 502, description = "Liveness probe failed", body = crate::error::ApiError)
    )
)]
pub async fn auth_status(State(state): State<AppState>) -> Result<impl IntoResponse> {
    Ok(Json(state.orchestrator.auth().check_status().await?))
}

/// POST /auth/full - Store a full-session cookie bundle
///
/// Validates and stores the bundle, then reclassifies. A bundle the probe
/// rejects is still stored and reported as basic_authenticated; only a
/// malformed bundle is refused, leaving the previous credential in place.
#[utoipa::path(
    post,
    path = "/api/v1/auth/full",
    tag = "auth",
    request_body = FullAuthRequest,
    responses(
        (status = 200, description = "Resulting tier report", body = crate::types::AuthStatus),
        (status = 400, description = "Malformed cookie bundle", body = crate::error::ApiError),
        (status = 502, description = "Liveness probe failed", body = crate::error::ApiError)
    )
)]
pub async fn setup_full_auth(
    State(state): State<AppState>,
    Json(request): Json<FullAuthRequest>,
) -> Result<impl IntoResponse> {
    let status = state
        .orchestrator
        .auth()
        .setup_full_auth(&request.cookies)
        .await?;
    Ok(Json(status))
}
