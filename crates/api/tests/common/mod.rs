//! Shared helpers for HTTP-level integration tests.
//!
//! Uses Axum's `tower::ServiceExt::oneshot` to send requests directly to
//! the router without a TCP listener, exercising the same middleware
//! stack production uses.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use parkprint_api::auth::jwt::{generate_access_token, JwtConfig};
use parkprint_api::config::ServerConfig;
use parkprint_api::router::build_app_router;
use parkprint_api::state::AppState;

/// Fleet token agents present in tests.
pub const AGENT_TOKEN: &str = "test-agent-token";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: "test-jwt-secret".to_string(),
            access_token_expiry_mins: 15,
        },
        agent_token: AGENT_TOKEN.to_string(),
    }
}

/// Build the full application router with all middleware layers, using
/// the given database pool. Mirrors the construction in `main.rs`.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Mint a valid producer JWT for the default test user.
pub fn producer_token() -> String {
    generate_access_token(1, "cashier1", "Front Desk Cashier", &test_config().jwt)
        .expect("token generation")
}

/// GET with producer auth.
pub async fn producer_get(app: Router, path: &str) -> Response<Body> {
    let req = Request::builder()
        .method("GET")
        .uri(path)
        .header("authorization", format!("Bearer {}", producer_token()))
        .body(Body::empty())
        .unwrap();
    app.oneshot(req).await.unwrap()
}

/// POST JSON with producer auth.
pub async fn producer_post(app: Router, path: &str, body: serde_json::Value) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("authorization", format!("Bearer {}", producer_token()))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(req).await.unwrap()
}

/// POST JSON with agent auth.
pub async fn agent_post(
    app: Router,
    path: &str,
    agent_id: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .header("authorization", format!("Bearer {AGENT_TOKEN}"))
        .header("x-agent-id", agent_id)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(req).await.unwrap()
}

/// POST with no body and no auth headers at all.
pub async fn anonymous_post(app: Router, path: &str) -> Response<Body> {
    let req = Request::builder()
        .method("POST")
        .uri(path)
        .body(Body::empty())
        .unwrap();
    app.oneshot(req).await.unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body is not valid JSON")
}

/// Enqueue a receipt job through the API, returning its id.
pub async fn enqueue_receipt(app: &Router, pool_tag: &str) -> i64 {
    let response = producer_post(
        app.clone(),
        "/api/v1/print-jobs",
        serde_json::json!({
            "job_type": "receipt",
            "payload": {"ticket_id": pool_tag},
        }),
    )
    .await;
    let json = body_json(response).await;
    json["data"]["job"]["id"].as_i64().expect("job id")
}
