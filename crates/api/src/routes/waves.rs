use axum::routing::{get, post};
use axum::Router;

use crate::handlers::waves;
use crate::state::AppState;

/// Routes mounted at `/waves`.
///
/// ```text
/// POST   /                    -> create_wave
/// GET    /{id}                -> get_wave
/// POST   /{id}/restart-all    -> restart_all
/// POST   /{id}/reset-status   -> reset_status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(waves::create_wave))
        .route("/{id}", get(waves::get_wave))
        .route("/{id}/restart-all", post(waves::restart_all))
        .route("/{id}/reset-status", post(waves::reset_status))
}
