//! Handlers for the `/jobs` resource.
//!
//! Per-job routes address a job by target id. The source id comes from
//! `?source_id=` when given, otherwise it is resolved from the lock store
//! and then from the most recent job row for the target.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use waveline_core::job::{DispatchParameters, JobListQuery, ParameterOverrides};
use waveline_core::types::{JobKey, TargetId};
use waveline_engine::jobs::RunCommand;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /jobs/run`.
#[derive(Debug, Deserialize)]
pub struct RunJobRequest {
    pub source_id: String,
    pub target_id: TargetId,
    #[serde(flatten)]
    pub parameters: DispatchParameters,
    #[serde(default)]
    pub wave_id: Option<String>,
    #[serde(default)]
    pub force: bool,
}

/// `?source_id=` on per-job routes.
#[derive(Debug, Default, Deserialize)]
pub struct SourceQuery {
    pub source_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RestartRequest {
    #[serde(flatten)]
    pub overrides: ParameterOverrides,
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct KillRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(default, alias = "current_stage")]
    pub stage: Option<String>,
}

async fn resolve(state: &AppState, target_id: TargetId, query: &SourceQuery) -> AppResult<JobKey> {
    Ok(state
        .engine
        .jobs
        .resolve_key(target_id, query.source_id.as_deref())
        .await?)
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/run
///
/// Acquire the lock and dispatch. Returns 202 once the migration service
/// accepted the job; the outcome arrives later by webhook.
pub async fn run_job(
    State(state): State<AppState>,
    Json(input): Json<RunJobRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .engine
        .jobs
        .run(RunCommand {
            key: JobKey::new(input.source_id, input.target_id),
            parameters: input.parameters,
            wave_id: input.wave_id,
            force: input.force,
        })
        .await?;

    Ok((StatusCode::ACCEPTED, Json(DataResponse::new(outcome))))
}

/// POST /api/v1/jobs/{target_id}/restart
///
/// Re-dispatch with the stored parameters, selectively overridden by the
/// body. The body is optional.
pub async fn restart_job(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
    body: Option<Json<RestartRequest>>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let Json(input) = body.unwrap_or_default();
    let outcome = state
        .engine
        .jobs
        .restart(&key, input.overrides, input.force)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(DataResponse::new(outcome))))
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{target_id}/kill
pub async fn kill_job(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
    body: Option<Json<KillRequest>>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let Json(input) = body.unwrap_or_default();
    let report = state.engine.jobs.kill(&key, input.force).await?;
    Ok(Json(DataResponse::new(report)))
}

/// DELETE /api/v1/jobs/{target_id}/lock
///
/// Administrative unlock; the job status is not touched. Returns the
/// removed lock record.
pub async fn remove_lock(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let lock = state.engine.jobs.remove_lock(&key).await?;
    Ok(Json(DataResponse::new(lock)))
}

/// POST /api/v1/jobs/{target_id}/reset-status
pub async fn reset_status(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let job = state.engine.jobs.reset(&key).await?;
    Ok(Json(DataResponse::new(job)))
}

/// POST /api/v1/jobs/{target_id}/hard-reset
///
/// Always 200 once the key is known; `data.success` and the per-step
/// breakdown report what actually happened.
pub async fn hard_reset(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let report = state.engine.jobs.hard_reset(&key).await?;
    Ok(Json(DataResponse::new(report)))
}

// ---------------------------------------------------------------------------
// Introspection
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs: Vec<_> = state
        .engine
        .jobs
        .list(&params)
        .await?
        .iter()
        .map(|job| job.redacted())
        .collect();
    Ok(Json(DataResponse::new(jobs)))
}

/// GET /api/v1/jobs/{target_id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let job = state.engine.jobs.find(&key).await?;
    Ok(Json(DataResponse::new(job.redacted())))
}

/// GET /api/v1/jobs/{target_id}/process
pub async fn process_info(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let info = state.engine.jobs.process_info(&key).await?;
    Ok(Json(DataResponse::new(info)))
}

/// GET /api/v1/jobs/{target_id}/status-from-server
///
/// Poll fallback: proxies the migration service's status endpoint and
/// ingests terminal or running statuses like a webhook.
pub async fn status_from_server(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let report = state.engine.correlator.poll(&key).await?;
    Ok(Json(DataResponse::new(report)))
}

/// POST /api/v1/jobs/{target_id}/heartbeat
pub async fn heartbeat(
    State(state): State<AppState>,
    Path(target_id): Path<TargetId>,
    Query(query): Query<SourceQuery>,
    body: Option<Json<HeartbeatRequest>>,
) -> AppResult<impl IntoResponse> {
    let key = resolve(&state, target_id, &query).await?;
    let Json(input) = body.unwrap_or_default();
    let lock = state.engine.jobs.heartbeat(&key, input.stage).await?;
    Ok(Json(DataResponse::new(lock)))
}
