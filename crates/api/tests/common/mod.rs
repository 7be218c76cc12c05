//! Shared harness for API integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use devspace_api::auth::jwt::JwtConfig;
use devspace_api::config::ServerConfig;
use devspace_api::router::build_app_router;
use devspace_api::state::AppState;
use devspace_relay::manager::{RelayConfig, RelayManager};
use devspace_relay::reconnect::ReconnectConfig;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct-horse-battery";

/// Build a test `ServerConfig`.
///
/// The relay points at a closed local port, so every execution fails
/// quickly with a connection error.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 45,
        jwt: JwtConfig {
            secret: "test-secret-do-not-use".to_string(),
            session_expiry_hours: 1,
        },
        relay: RelayConfig {
            worker_url: "ws://127.0.0.1:1/ws".to_string(),
            connect_timeout: Duration::from_millis(200),
            send_timeout: Duration::from_millis(200),
            request_timeout: Duration::from_secs(3),
            connect_wait: Duration::from_millis(100),
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(50),
                max_delay: Duration::from_millis(200),
                multiplier: 2.0,
            },
            result_retention: Duration::from_secs(60),
        },
    }
}

/// Build the full application router over a fresh in-memory database and
/// relay.
pub async fn build_test_app() -> Router {
    let config = test_config();
    let pool = devspace_db::create_memory_pool()
        .await
        .expect("Failed to create test database");
    let relay = RelayManager::start(config.relay.clone()).await;

    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        relay,
    };

    build_app_router(state, &config)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(
    app: Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None, None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::GET, uri, Some(token), None).await
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, None, Some(body)).await
}

pub async fn post_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(token), Some(body)).await
}

pub async fn put_json_auth(app: Router, uri: &str, token: &str, body: Value) -> Response<Body> {
    send(app, Method::PUT, uri, Some(token), Some(body)).await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(token), None).await
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Account helpers
// ---------------------------------------------------------------------------

/// Sign a user up and in. Returns `(user_id, access_token)`.
pub async fn signup_and_signin(app: &Router, username: &str) -> (String, String) {
    let response = post_json(
        app.clone(),
        "/api/v1/auth/signup",
        json!({
            "username": username,
            "email": format!("{username}@example.com"),
            "password": PASSWORD,
        }),
    )
    .await;
    assert_eq!(response.status(), 201, "signup for {username}");

    let response = post_json(
        app.clone(),
        "/api/v1/auth/signin",
        json!({ "username": username, "password": PASSWORD }),
    )
    .await;
    assert_eq!(response.status(), 200, "signin for {username}");
    let json = body_json(response).await;

    (
        json["data"]["user"]["id"].as_str().unwrap().to_string(),
        json["data"]["accessToken"].as_str().unwrap().to_string(),
    )
}
