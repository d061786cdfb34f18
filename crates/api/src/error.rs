use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use waveline_core::error::CoreError;
use waveline_dispatch::DispatchError;
use waveline_engine::EngineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps engine and domain errors. Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `waveline_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error from the coordination engine.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal(message: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %message, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::AlreadyLocked { .. } => {
            (StatusCode::CONFLICT, "ALREADY_LOCKED", err.to_string())
        }
        CoreError::ConflictingTerminalResult { .. } => {
            (StatusCode::CONFLICT, "CONFLICTING_RESULT", err.to_string())
        }
        CoreError::Correlation(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "CORRELATION_FAILED",
            msg.clone(),
        ),
        CoreError::Storage(_) | CoreError::Io(_) | CoreError::Internal(_) => {
            internal(&err.to_string())
        }
    }
}

fn classify_dispatch(err: &DispatchError) -> (StatusCode, &'static str, String) {
    match err {
        DispatchError::Rejected { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "REJECTED_BY_REMOTE",
            err.to_string(),
        ),
        DispatchError::Transport { .. } => {
            tracing::warn!(error = %err, "Migration service unreachable");
            (StatusCode::BAD_GATEWAY, "REMOTE_UNREACHABLE", err.to_string())
        }
        DispatchError::ServerError { .. } | DispatchError::Decode(_) => {
            tracing::warn!(error = %err, "Migration service failed");
            (StatusCode::BAD_GATEWAY, "REMOTE_ERROR", err.to_string())
        }
        DispatchError::InvalidUrl(_) | DispatchError::Setup(_) => internal(&err.to_string()),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) | AppError::Engine(EngineError::Core(core)) => classify_core(core),
            AppError::Engine(EngineError::Dispatch(dispatch)) => classify_dispatch(dispatch),
        };

        let body = json!({
            "success": false,
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
