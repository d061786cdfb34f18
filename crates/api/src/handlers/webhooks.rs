//! Result ingestion from the migration service.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use waveline_core::webhook::{CallbackIdentity, WebhookPayload};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/webhooks/migration-result
///
/// Identity may come from the body or from the callback query string.
/// Succeeds once the result is persisted (or recognized as a duplicate,
/// conflict or progress report); the wave recompute that follows never
/// changes the response.
pub async fn migration_result(
    State(state): State<AppState>,
    Query(identity): Query<CallbackIdentity>,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<impl IntoResponse> {
    let outcome = state
        .engine
        .correlator
        .ingest_webhook(payload, &identity)
        .await?;
    Ok(Json(DataResponse::new(outcome)))
}
