//! Scrape job handlers: start, list, inspect, stream, wait, cancel.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use tokio_stream::StreamExt;

use crate::api::AppState;
use crate::error::Result;
use crate::types::{JobId, ScrapeRequest};

use super::{CancelResponse, ResultQuery, StartScrapeResponse};

/// POST /scrape - Start a scrape job
#[utoipa::path(
    post,
    path = "/api/v1/scrape",
    tag = "scrape",
    request_body = ScrapeRequest,
    responses(
        (status = 202, description = "Job accepted and queued", body = StartScrapeResponse),
        (status = 400, description = "Invalid request or credential", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_scrape(
    State(state): State<AppState>,
    Json(request): Json<ScrapeRequest>,
) -> Result<impl IntoResponse> {
    let snapshot = state.orchestrator.start(request).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartScrapeResponse {
            job_id: snapshot.id,
            state: snapshot.state,
        }),
    ))
}

/// GET /scrape - List known jobs
#[utoipa::path(
    get,
    path = "/api/v1/scrape",
    tag = "scrape",
    responses(
        (status = 200, description = "Snapshots of all known jobs", body = [crate::types::JobSnapshot])
    )
)]
pub async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.orchestrator.jobs().await)
}

/// GET /scrape/:id - Job snapshot
#[utoipa::path(
    get,
    path = "/api/v1/scrape/{id}",
    tag = "scrape",
    params(("id" = i64, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job snapshot", body = crate::types::JobSnapshot),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<impl IntoResponse> {
    Ok(Json(state.orchestrator.job(id).await?))
}

/// GET /scrape/:id/events - SSE progress stream
///
/// Replays the recorded event sequence from 0, then follows live events;
/// the stream closes after the terminal event. A subscriber that falls
/// behind the live buffer receives a final `error` message with code
/// `slow_consumer` and is disconnected; resubscribing replays everything.
#[utoipa::path(
    get,
    path = "/api/v1/scrape/{id}/events",
    tag = "scrape",
    params(("id" = i64, Path, description = "Job id")),
    responses(
        (status = 200, description = "Progress event stream (text/event-stream)", content_type = "text/event-stream"),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn job_events(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> Result<Sse<impl tokio_stream::Stream<Item = std::result::Result<SseEvent, Infallible>>>> {
    let events = state.orchestrator.subscribe(id).await?;

    let sse_stream = events.filter_map(|item| match item {
        Ok(event) => match serde_json::to_string(&event) {
            Ok(json_data) => Some(Ok(SseEvent::default()
                .event(event.kind.as_str())
                .id(event.seq.to_string())
                .data(json_data))),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize progress event");
                None
            }
        },
        Err(lag) => {
            tracing::warn!(skipped = lag.skipped, "SSE client lagged, disconnecting");
            Some(Ok(SseEvent::default().event("error").data(format!(
                r#"{{"error":"slow_consumer","skipped":{}}}"#,
                lag.skipped
            ))))
        }
    });

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::default()))
}

/// GET /scrape/:id/result - Wait for the job result
///
/// Blocks up to `timeout_secs` (config default when omitted). A failed
/// job answers 422 with the full result as body — same shape as success,
/// with `success=false` and a `reason`.
#[utoipa::path(
    get,
    path = "/api/v1/scrape/{id}/result",
    tag = "scrape",
    params(
        ("id" = i64, Path, description = "Job id"),
        ("timeout_secs" = Option<u64>, Query, description = "Seconds to wait before answering 409")
    ),
    responses(
        (status = 200, description = "Successful scrape result", body = crate::types::ScrapeResult),
        (status = 422, description = "Job failed; body carries the partial result", body = crate::types::ScrapeResult),
        (status = 404, description = "Unknown job", body = crate::error::ApiError),
        (status = 409, description = "Job still running after the wait", body = crate::error::ApiError)
    )
)]
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
    Query(query): Query<ResultQuery>,
) -> Result<Response> {
    let timeout = query.timeout_secs.map(Duration::from_secs);
    let result = state.orchestrator.get_result(id, timeout).await?;

    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    Ok((status, Json(result.as_ref().clone())).into_response())
}

/// POST /scrape/:id/cancel - Request cancellation
///
/// Always answers 200: cancelling a finished, cancelled or unknown job
/// is a no-op, and repeating the call changes nothing.
#[utoipa::path(
    post,
    path = "/api/v1/scrape/{id}/cancel",
    tag = "scrape",
    params(("id" = i64, Path, description = "Job id")),
    responses(
        (status = 200, description = "Cancellation requested (idempotent)", body = CancelResponse)
    )
)]
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> impl IntoResponse {
    state.orchestrator.cancel(id).await;
    Json(CancelResponse {
        status: "ok".to_string(),
    })
}
