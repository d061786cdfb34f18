use axum::extract::State;
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// `None` when no backend uses the database.
    pub db_healthy: Option<bool>,
    pub locks_held: Option<usize>,
}

/// GET /health -- service, database and lock store health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let db_healthy = match &state.pool {
        Some(pool) => Some(waveline_db::health_check(pool).await.is_ok()),
        None => None,
    };
    let locks_held = state.engine.context().locks.list_all().await.ok().map(|l| l.len());

    let healthy = db_healthy != Some(false) && locks_held.is_some();
    Json(HealthResponse {
        status: if healthy { "ok" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        db_healthy,
        locks_held,
    })
}

/// Mount health check routes (root level, not under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
