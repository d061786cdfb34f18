//! Route definitions for the `/jobs` resource.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted at `/jobs`.
///
/// ```text
/// GET    /                                  -> list_jobs
/// POST   /run                               -> run_job
/// GET    /{target_id}                       -> get_job
/// POST   /{target_id}/restart               -> restart_job
/// POST   /{target_id}/kill                  -> kill_job
/// DELETE /{target_id}/lock                  -> remove_lock
/// POST   /{target_id}/reset-status          -> reset_status
/// POST   /{target_id}/hard-reset            -> hard_reset
/// GET    /{target_id}/process               -> process_info
/// GET    /{target_id}/status-from-server    -> status_from_server
/// POST   /{target_id}/heartbeat             -> heartbeat
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(jobs::list_jobs))
        .route("/run", post(jobs::run_job))
        .route("/{target_id}", get(jobs::get_job))
        .route("/{target_id}/restart", post(jobs::restart_job))
        .route("/{target_id}/kill", post(jobs::kill_job))
        .route("/{target_id}/lock", delete(jobs::remove_lock))
        .route("/{target_id}/reset-status", post(jobs::reset_status))
        .route("/{target_id}/hard-reset", post(jobs::hard_reset))
        .route("/{target_id}/process", get(jobs::process_info))
        .route("/{target_id}/status-from-server", get(jobs::status_from_server))
        .route("/{target_id}/heartbeat", post(jobs::heartbeat))
}
