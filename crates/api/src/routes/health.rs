use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database answers `SELECT 1`.
    pub db_healthy: bool,
    /// Whether the execution worker link is up.
    pub worker_connected: bool,
}

/// GET /health -- returns service, store and worker link health.
///
/// A down worker link does not degrade the status: executions queue and
/// fail individually while the link reconnects.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = devspace_db::health_check(&state.pool).await.is_ok();
    let worker_connected = state.relay.is_connected();

    let status = if db_healthy { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        worker_connected,
    })
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
