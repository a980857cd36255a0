//! Feature modules plug into the API through [`Module`].
//!
//! A module owns a slice of the URL space (`/api/{name}`), its SQLite schema
//! and an OpenAPI fragment. The registry drives the hooks in this order:
//! migrations, `init`, `routes`, `start`; `stop` runs on shutdown.

use async_trait::async_trait;
use axum::Router;

use bookstore_db::{DbPool, Migration};

use crate::settings::Settings;

/// Borrowed startup resources handed to every hook.
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
    /// Shared pool; modules clone it into their router state.
    pub db: &'a DbPool,
}

#[async_trait]
pub trait Module: Sync + Send {
    /// Stable name, also the mount segment under `/api`.
    fn name(&self) -> &'static str;

    /// Runs once the schema is current.
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Handlers relative to the module mount point.
    fn routes(&self, _ctx: &InitCtx<'_>) -> Router {
        Router::new()
    }

    /// OpenAPI document with paths relative to the mount point.
    fn openapi(&self) -> Option<serde_json::Value> {
        None
    }

    /// Schema scripts, applied at most once each and keyed by `(name, id)`.
    fn migrations(&self) -> Vec<Migration> {
        Vec::new()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
