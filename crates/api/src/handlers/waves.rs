//! Handlers for the `/waves` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use waveline_engine::waves::{CreateWave, RestartAll};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/waves
///
/// Create a wave; missing member jobs are created as `pending`.
pub async fn create_wave(
    State(state): State<AppState>,
    Json(input): Json<CreateWave>,
) -> AppResult<impl IntoResponse> {
    let wave = state.engine.waves.create_wave(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(wave))))
}

/// GET /api/v1/waves/{id}
///
/// Progress is recomputed from member statuses on every read.
pub async fn get_wave(
    State(state): State<AppState>,
    Path(wave_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let wave = state.engine.waves.recompute(&wave_id).await?;
    Ok(Json(DataResponse::new(wave)))
}

/// POST /api/v1/waves/{id}/restart-all
///
/// Optional body: `members` subset, parameter overrides and `force`.
/// Per-member failures are reported in the body, not as an error status.
pub async fn restart_all(
    State(state): State<AppState>,
    Path(wave_id): Path<String>,
    body: Option<Json<RestartAll>>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body.unwrap_or_default();
    let report = state.engine.waves.restart_all(&wave_id, input).await?;
    Ok(Json(DataResponse::new(report)))
}

/// POST /api/v1/waves/{id}/reset-status
pub async fn reset_status(
    State(state): State<AppState>,
    Path(wave_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let report = state.engine.waves.reset_wave_status(&wave_id).await?;
    Ok(Json(DataResponse::new(report)))
}
