//! Collaborators shared by the engine services.

use std::sync::Arc;

use waveline_core::liveness::ProcessProbe;
use waveline_core::lock::LockStore;
use waveline_core::store::Store;
use waveline_dispatch::MigrationServiceApi;
use waveline_events::EventBus;

use crate::config::CoordinatorConfig;

/// Everything a coordinator operation touches, passed explicitly.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn Store>,
    pub locks: Arc<dyn LockStore>,
    pub probe: Arc<dyn ProcessProbe>,
    pub remote: MigrationServiceApi,
    pub events: Arc<EventBus>,
    pub config: Arc<CoordinatorConfig>,
}
