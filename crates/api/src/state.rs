use std::sync::Arc;

use waveline_engine::Engine;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: the engine services share one context behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: Arc<ServerConfig>,
    /// Present when any backend is PostgreSQL; used by the health check.
    pub pool: Option<waveline_db::DbPool>,
}
