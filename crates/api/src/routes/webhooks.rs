use axum::routing::post;
use axum::Router;

use crate::handlers::webhooks;
use crate::state::AppState;

/// Routes mounted at `/webhooks`.
///
/// The migration service calls `/migration-result` with the callback URL
/// it was handed at dispatch time.
pub fn router() -> Router<AppState> {
    Router::new().route("/migration-result", post(webhooks::migration_result))
}
