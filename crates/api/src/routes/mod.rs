pub mod health;
pub mod jobs;
pub mod waves;
pub mod webhooks;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                                  list
/// /jobs/run                              dispatch (POST)
/// /jobs/{target_id}                      get
/// /jobs/{target_id}/restart              re-dispatch (POST)
/// /jobs/{target_id}/kill                 cancel (POST)
/// /jobs/{target_id}/lock                 administrative unlock (DELETE)
/// /jobs/{target_id}/reset-status         back to pending (POST)
/// /jobs/{target_id}/hard-reset           composite recovery (POST)
/// /jobs/{target_id}/process              lock and liveness introspection
/// /jobs/{target_id}/status-from-server   poll fallback
/// /jobs/{target_id}/heartbeat            remote worker heartbeat (POST)
///
/// /webhooks/migration-result             result ingestion (POST)
///
/// /waves                                 create (POST)
/// /waves/{id}                            get, progress recomputed
/// /waves/{id}/restart-all                bulk restart (POST)
/// /waves/{id}/reset-status               bulk reset (POST)
/// ```
///
/// Per-job routes accept `?source_id=` to disambiguate a target id.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/webhooks", webhooks::router())
        .nest("/waves", waves::router())
}
