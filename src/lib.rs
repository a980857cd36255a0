//! Bookstore API
//!
//! Book catalog module plus the bootstrap that wires settings, the SQLite
//! pool, migrations and the HTTP server together.

pub mod modules;

use anyhow::Context;
use bookstore_kernel::{settings::Settings, DbPool, InitCtx, ModuleRegistry};

/// Re-export commonly used types
pub use modules::*;

/// Registry holding every module this application ships.
pub fn registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);
    registry
}

/// Open the configured database pool.
pub async fn connect(settings: &Settings) -> anyhow::Result<DbPool> {
    bookstore_db::connect(&settings.database.url, settings.database.max_connections)
        .await
        .context("failed to open bookstore database")
}

/// Apply pending migrations of every registered module.
pub async fn migrate(db: &DbPool, registry: &ModuleRegistry) -> anyhow::Result<usize> {
    let migrations = registry.collect_migrations();
    let applied = bookstore_db::run_migrations(db, &migrations)
        .await
        .context("failed to run migrations")?;
    tracing::info!(applied, total = migrations.len(), "migrations complete");
    Ok(applied)
}

/// Run the API server until a shutdown signal arrives.
pub async fn run_api(settings: &Settings) -> anyhow::Result<()> {
    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "bookstore-api bootstrap starting"
    );

    let db = connect(settings).await?;
    let registry = registry();
    migrate(&db, &registry).await?;

    let ctx = InitCtx {
        settings,
        db: &db,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!("bookstore-api bootstrap complete");
    let served = bookstore_http::start_server(&registry, &ctx).await;

    registry.stop_modules().await?;
    db.close().await;
    served
}
