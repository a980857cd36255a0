//! SQLite connection pool factory and module migration runner.

use std::str::FromStr;

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// Shared pool handle. Cloning is cheap; handlers borrow it per request.
pub type DbPool = sqlx::SqlitePool;

/// Migration definition contributed by a module.
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub up: &'static str,
}

const MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        module     TEXT NOT NULL,
        id         TEXT NOT NULL,
        applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (module, id)
    )
"#;

/// Open a connection pool for the given SQLite URL, creating the database file if missing.
pub async fn connect(url: &str, max_connections: u32) -> anyhow::Result<DbPool> {
    let options = SqliteConnectOptions::from_str(url)
        .with_context(|| format!("invalid database url '{url}'"))?
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to database '{url}'"))?;

    tracing::info!(target: "bookstore-db", url, max_connections, "database pool ready");
    Ok(pool)
}

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row, so a failing migration leaves no partial schema behind. Returns the
/// number of migrations applied by this call.
pub async fn run_migrations(
    pool: &DbPool,
    migrations: &[(String, Migration)],
) -> anyhow::Result<usize> {
    sqlx::raw_sql(MIGRATIONS_TABLE)
        .execute(pool)
        .await
        .context("failed to create schema_migrations table")?;

    let mut applied = 0;
    for (module, migration) in migrations {
        let already_applied: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM schema_migrations WHERE module = ?1 AND id = ?2")
                .bind(module.as_str())
                .bind(migration.id)
                .fetch_optional(pool)
                .await
                .with_context(|| format!("failed to read migration state for '{module}'"))?;

        if already_applied.is_some() {
            tracing::debug!(target: "bookstore-db", module = %module, id = migration.id, "migration already applied");
            continue;
        }

        let mut tx = pool.begin().await.context("failed to open migration transaction")?;
        sqlx::raw_sql(migration.up)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("migration '{}/{}' failed", module, migration.id))?;
        sqlx::query("INSERT INTO schema_migrations (module, id) VALUES (?1, ?2)")
            .bind(module.as_str())
            .bind(migration.id)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to record migration '{}/{}'", module, migration.id))?;
        tx.commit()
            .await
            .with_context(|| format!("failed to commit migration '{}/{}'", module, migration.id))?;

        tracing::info!(target: "bookstore-db", module = %module, id = migration.id, "migration applied");
        applied += 1;
    }

    Ok(applied)
}
