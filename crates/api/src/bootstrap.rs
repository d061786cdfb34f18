//! Wiring of the engine from configuration: store and lock backends,
//! outbound HTTP client, process probe and event bus.

use std::sync::Arc;

use waveline_core::liveness::SignalProbe;
use waveline_core::lock::{FileLockStore, LockStore};
use waveline_core::store::{MemoryStore, Store};
use waveline_db::lock_store::PgLockStore;
use waveline_db::store::PgStore;
use waveline_db::DbPool;
use waveline_dispatch::{DispatchError, MigrationServiceApi, ReqwestTransport, ResilientClient};
use waveline_engine::{Engine, EngineContext};
use waveline_events::EventBus;

use crate::config::{CoordinatorSettings, LockBackend, StoreBackend};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Lock store error: {0}")]
    Locks(#[from] waveline_core::error::CoreError),

    #[error("HTTP client error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("{0} backend needs DATABASE_URL")]
    NoDatabase(&'static str),
}

/// A wired engine plus the pool, when one was opened.
pub struct Wiring {
    pub engine: Engine,
    pub pool: Option<DbPool>,
}

/// Connect, migrate and build the engine.
pub async fn wire(settings: &CoordinatorSettings) -> Result<Wiring, StartupError> {
    let needs_database = settings.store_backend == StoreBackend::Postgres
        || settings.lock_backend == LockBackend::Postgres;
    let pool = match (&settings.database_url, needs_database) {
        (Some(url), true) => {
            let pool = waveline_db::create_pool(url).await?;
            waveline_db::health_check(&pool).await?;
            waveline_db::run_migrations(&pool).await?;
            tracing::info!("Database ready, migrations applied");
            Some(pool)
        }
        (None, true) => return Err(StartupError::NoDatabase("postgres")),
        (_, false) => None,
    };

    let store: Arc<dyn Store> = match (settings.store_backend, &pool) {
        (StoreBackend::Postgres, Some(pool)) => Arc::new(PgStore::new(pool.clone())),
        (StoreBackend::Postgres, None) => return Err(StartupError::NoDatabase("store")),
        (StoreBackend::Memory, _) => Arc::new(MemoryStore::new()),
    };
    let locks: Arc<dyn LockStore> = match (settings.lock_backend, &pool) {
        (LockBackend::Postgres, Some(pool)) => Arc::new(PgLockStore::new(pool.clone())),
        (LockBackend::Postgres, None) => return Err(StartupError::NoDatabase("lock")),
        (LockBackend::File, _) => Arc::new(FileLockStore::open(settings.lock_dir.clone()).await?),
    };
    tracing::info!(
        store = ?settings.store_backend,
        locks = ?settings.lock_backend,
        lock_dir = %settings.lock_dir.display(),
        "Persistence backends selected",
    );

    let transport = Arc::new(ReqwestTransport::new(settings.http_timeout)?);
    let client = ResilientClient::new(transport, settings.retry);
    let remote = MigrationServiceApi::new(client, &settings.migration_service_url)?;

    let engine = Engine::new(EngineContext {
        store,
        locks,
        probe: Arc::new(SignalProbe),
        remote,
        events: Arc::new(EventBus::default()),
        config: Arc::new(settings.engine.clone()),
    });
    Ok(Wiring { engine, pool })
}
