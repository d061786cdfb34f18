//! PostgreSQL persistence for the waveline coordinator.
//!
//! - [`models`]: row types and their conversion into domain records.
//! - [`repositories`]: zero-sized repos with one async fn per query.
//! - [`PgStore`] / [`PgLockStore`]: the core persistence traits on top of
//!   the repos.

use sqlx::postgres::PgPoolOptions;

pub mod lock_store;
pub mod models;
pub mod repositories;
pub mod store;

pub use lock_store::PgLockStore;
pub use store::PgStore;

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Round-trip a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
