use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Whether the database is reachable. Absent when running without one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_healthy: Option<bool>,
    /// Whether the submission queue is connected. Absent when not queueing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_connected: Option<bool>,
}

/// GET /health -- returns service, database and queue health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match &state.pool {
        Some(pool) => Some(gigs_db::health_check(pool).await.is_ok()),
        None => None,
    };
    let queue_connected = state.queue.as_ref().map(|queue| queue.is_connected());

    let degraded = db_healthy == Some(false) || queue_connected == Some(false);
    Json(HealthResponse {
        status: if degraded { "degraded" } else { "ok" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        queue_connected,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
