use super::*;
use crate::config::Config;
use crate::driver::{DriverFault, DriverNotice};
use crate::orchestrator::test_helpers::{happy_script, orchestrator_with, ScriptedDriver};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

/// Router backed by a scripted driver and a default config
fn app(scripts: Vec<Vec<DriverNotice>>) -> Router {
    app_with_config(scripts, Config::default())
}

fn app_with_config(scripts: Vec<Vec<DriverNotice>>, config: Config) -> Router {
    app_with_driver(ScriptedDriver::new(scripts), config)
}

fn app_with_driver(driver: ScriptedDriver, config: Config) -> Router {
    create_router(orchestrator_with(driver, config))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = app(vec![]);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_openapi_json_endpoint() {
    let app = app(vec![]);

    let response = app.oneshot(get("/openapi.json")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json.get("openapi").is_some(), "Should have 'openapi' field");
    assert!(
        json["openapi"].as_str().unwrap().starts_with("3."),
        "Should be OpenAPI 3.x"
    );
    assert_eq!(json["info"]["title"], "scrapeflow REST API");
    assert!(json["paths"]["/api/v1/scrape"]["post"].is_object());
    assert!(json["paths"]["/api/v1/scrape/{id}/events"]["get"].is_object());
    assert!(json["paths"]["/api/v1/auth/status"]["get"].is_object());
}

#[tokio::test]
async fn test_cors_enabled() {
    let app = app(vec![]);

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers().contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_swagger_ui_enabled() {
    let mut config = Config::default();
    config.api.swagger_ui = true;
    let app = app_with_config(vec![], config);

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Swagger UI should be accessible when enabled"
    );
}

#[tokio::test]
async fn test_swagger_ui_disabled() {
    let mut config = Config::default();
    config.api.swagger_ui = false;
    let app = app_with_config(vec![], config);

    let response = app.oneshot(get("/swagger-ui/")).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::NOT_FOUND,
        "Swagger UI should not be accessible when disabled"
    );
}

#[tokio::test]
async fn test_start_scrape_accepted_and_result_flow() {
    let app = app(vec![happy_script("alice", 5, 5)]);

    let response = app
        .clone()
        .oneshot(post_json(
            "/scrape",
            json!({"username": "alice", "mode": "single-profile", "streaming": true}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["state"], "queued");
    let id = body["job_id"].as_i64().unwrap();

    // Snapshot is available immediately
    let response = app
        .clone()
        .oneshot(get(&format!("/scrape/{id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let snapshot = body_json(response).await;
    assert_eq!(snapshot["id"], id);
    assert_eq!(snapshot["request"]["username"], "alice");

    // Blocking result fetch answers 200 with the full result
    let response = app
        .clone()
        .oneshot(get(&format!("/scrape/{id}/result?timeout_secs=5")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let result = body_json(response).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["profile"]["username"], "alice");
    assert_eq!(result["posts"].as_array().unwrap().len(), 5);

    // And the job list shows the terminal state
    let response = app.oneshot(get("/scrape")).await.unwrap();
    let jobs = body_json(response).await;
    assert_eq!(jobs.as_array().unwrap().len(), 1);
    assert_eq!(jobs[0]["state"], "completed");
}

#[tokio::test]
async fn test_start_scrape_invalid_request_is_400() {
    let app = app(vec![]);

    // Both username and hashtag set
    let response = app
        .clone()
        .oneshot(post_json(
            "/scrape",
            json!({"username": "alice", "hashtag": "food", "mode": "single-profile"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_request");

    // Malformed cookie override is refused before a job is created
    let response = app
        .clone()
        .oneshot(post_json(
            "/scrape",
            json!({"username": "alice", "mode": "single-profile", "cookies": ";;;"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.oneshot(get("/scrape")).await.unwrap();
    let jobs = body_json(response).await;
    assert!(jobs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_job_result_is_422_with_full_body() {
    let app = app(vec![vec![DriverNotice::Fatal(DriverFault::target_not_found(
        "no such account",
    ))]]);

    let response = app
        .clone()
        .oneshot(post_json(
            "/scrape",
            json!({"username": "ghost", "mode": "single-profile"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let id = body_json(response).await["job_id"].as_i64().unwrap();

    let response = app
        .oneshot(get(&format!("/scrape/{id}/result?timeout_secs=5")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let result = body_json(response).await;
    assert_eq!(result["success"], false);
    assert_eq!(result["reason"], "target_not_found");
    assert!(result["statistics"].is_object());
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let app = app(vec![]);

    let response = app.clone().oneshot(get("/scrape/42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "job_not_found");
    assert_eq!(body["error"]["details"]["job_id"], 42);

    let response = app.oneshot(get("/scrape/42/events")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_is_idempotent_even_for_unknown_jobs() {
    let app = app(vec![]);

    let response = app
        .oneshot(post_json("/scrape/99/cancel", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_job_events_streams_replay() {
    let app = app(vec![happy_script("alice", 3, 3)]);

    let response = app
        .clone()
        .oneshot(post_json(
            "/scrape",
            json!({"username": "alice", "mode": "single-profile"}),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["job_id"].as_i64().unwrap();

    // Let the job settle so the SSE stream terminates after replay
    let response = app
        .clone()
        .oneshot(get(&format!("/scrape/{id}/result?timeout_secs=5")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(get(&format!("/scrape/{id}/events")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"],
        "text/event-stream"
    );

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("event: start"));
    assert!(text.contains("event: complete"));
    assert!(text.contains("id: 0"));
}

#[tokio::test(start_paused = true)]
async fn test_job_events_closes_with_slow_consumer_error_on_lag() {
    // Tiny live buffer plus a slow driver: a subscriber that never drains
    // its stream must overflow and get the terminal error message
    let driver = ScriptedDriver::new(vec![happy_script("alice", 20, 20)])
        .with_step_delay(Duration::from_millis(50));
    let mut config = Config::default();
    config.orchestrator.event_buffer_size = 4;
    let app = app_with_driver(driver, config);

    let response = app
        .clone()
        .oneshot(post_json(
            "/scrape",
            json!({"username": "alice", "mode": "single-profile"}),
        ))
        .await
        .unwrap();
    let id = body_json(response).await["job_id"].as_i64().unwrap();

    // Open the stream while the job is still young, then leave it unread
    let response = app
        .clone()
        .oneshot(get(&format!("/scrape/{id}/events")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Drive the job to completion while nobody drains the subscription
    let done = app
        .oneshot(get(&format!("/scrape/{id}/result?timeout_secs=30")))
        .await
        .unwrap();
    assert_eq!(done.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("event: error"));
    assert!(
        text.contains(r#"{"error":"slow_consumer","skipped":"#),
        "lag message must carry the wire shape, got: {text}"
    );
    // The stream is cut at the lag point; no terminal replay after it
    assert!(!text.contains("event: complete"));
}

#[tokio::test]
async fn test_auth_status_defaults_to_anonymous() {
    let app = app(vec![]);

    let response = app.oneshot(get("/auth/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["tier"], "anonymous");
    assert!(body["benefits"].is_array());
    assert!(body["limitations"].is_array());
}

#[tokio::test]
async fn test_setup_full_auth_rejects_malformed_bundle() {
    let app = app(vec![]);

    let response = app
        .clone()
        .oneshot(post_json("/auth/full", json!({"cookies": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "invalid_credential");

    // A parseable bundle is stored; the stub probe classifies it as basic
    let response = app
        .oneshot(post_json(
            "/auth/full",
            json!({"cookies": "sessionid=abc123; csrftoken=tok"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tier"], "basic_authenticated");
    assert_eq!(body["cookie_count"], 2);
}

#[tokio::test]
async fn test_authentication_with_api_key() {
    let mut config = Config::default();
    config.api.api_key = Some("test-secret-key".to_string());
    let app = app_with_config(vec![], config);

    // Without a key
    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // With the right key
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Api-Key", "test-secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // With a wrong key
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("X-Api-Key", "wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_authentication_disabled_by_default() {
    let app = app(vec![]);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
