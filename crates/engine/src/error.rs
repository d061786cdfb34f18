use waveline_core::error::CoreError;
use waveline_dispatch::DispatchError;

/// Errors returned by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),
}

pub type EngineResult<T> = Result<T, EngineError>;
