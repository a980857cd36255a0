//! Reverse-proxy gateway.
//!
//! External requests are matched against the static route table from
//! `[[gateway.routes]]`, rewritten onto the downstream URL and forwarded
//! unchanged. Every response carries a permissive CORS policy.

use std::sync::Arc;

use anyhow::Context;
use axum::{routing::get, Router};

use bookstore_http::router::RouterBuilder;
use bookstore_kernel::settings::GatewaySettings;

pub mod proxy;
pub mod routes;
pub mod upstream;

pub use proxy::GatewayState;
pub use routes::{Route, RouteTable};
pub use upstream::{HyperUpstream, ProxyError, Upstream};

/// Build the gateway router: `/healthz` plus a proxying fallback.
pub fn build_router(state: GatewayState, settings: &GatewaySettings) -> Router {
    let proxy_router = Router::new()
        .route("/healthz", get(bookstore_http::health_check))
        .fallback(proxy::forward)
        .with_state(state);

    RouterBuilder::new()
        .merge(proxy_router)
        .with_tracing()
        .with_cors()
        .with_request_id()
        .with_timeout(settings.request_timeout_ms)
        .build()
}

/// Load the route table, bind the listener and proxy until shutdown.
pub async fn serve(settings: &GatewaySettings) -> anyhow::Result<()> {
    let routes =
        RouteTable::from_settings(&settings.routes).context("failed to load gateway routes")?;
    if routes.is_empty() {
        tracing::warn!("gateway has no routes configured; every request will 404");
    }
    for route in routes.routes() {
        tracing::info!(
            upstream = route.upstream_path(),
            downstream = route.downstream_url(),
            methods = ?route.methods(),
            "gateway route loaded"
        );
    }

    let state = GatewayState::new(routes, Arc::new(HyperUpstream::new()));
    let app = build_router(state, settings);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", settings.host, settings.port))
        .await
        .context("failed to bind gateway address")?;

    tracing::info!(
        "gateway listening on http://{}",
        listener.local_addr().context("listener has no local address")?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(bookstore_http::shutdown_signal())
        .await
        .context("gateway server failed")?;

    tracing::info!("gateway stopped");
    Ok(())
}
