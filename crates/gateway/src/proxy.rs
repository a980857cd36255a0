use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Response, Version},
};
use bookstore_http::error::AppError;

use crate::{
    routes::{Route, RouteTable},
    upstream::Upstream,
};

/// Headers that describe a single connection and never cross the proxy.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Shared, read-only gateway state.
#[derive(Clone)]
pub struct GatewayState {
    routes: Arc<RouteTable>,
    upstream: Arc<dyn Upstream>,
}

impl GatewayState {
    pub fn new(routes: RouteTable, upstream: Arc<dyn Upstream>) -> Self {
        Self {
            routes: Arc::new(routes),
            upstream,
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

/// Fallback handler: forward every request the route table knows about.
pub async fn forward(
    State(state): State<GatewayState>,
    req: Request,
) -> Result<Response<Body>, AppError> {
    let (mut parts, body) = req.into_parts();

    let Some(resolved) = state.routes.resolve(&parts.method, &parts.uri) else {
        return Err(AppError::not_found(format!(
            "no gateway route for {} {}",
            parts.method,
            parts.uri.path()
        )));
    };

    tracing::debug!(
        method = %parts.method,
        path = %parts.uri.path(),
        upstream = resolved.route.upstream_path(),
        target = %resolved.uri,
        "forwarding request"
    );

    let original_host = parts.headers.get(header::HOST).cloned();
    strip_hop_by_hop(&mut parts.headers);
    if let Some(host) = original_host {
        parts
            .headers
            .insert(HeaderName::from_static("x-forwarded-host"), host);
    }
    if let Some(authority) = resolved.uri.authority() {
        match HeaderValue::from_str(authority.as_str()) {
            Ok(host) => {
                parts.headers.insert(header::HOST, host);
            }
            Err(err) => return Err(AppError::bad_gateway(err.to_string())),
        }
    }
    parts.uri = resolved.uri;
    parts.version = Version::HTTP_11;

    let outbound = Request::from_parts(parts, body);
    let mut response = state
        .upstream
        .send(outbound)
        .await
        .map_err(|err| AppError::bad_gateway(err.to_string()))?;

    strip_hop_by_hop(response.headers_mut());
    relocate(response.headers_mut(), resolved.route);
    Ok(response)
}

/// Point a downstream `Location` back at the gateway prefix it came through.
fn relocate(headers: &mut HeaderMap, route: &Route) {
    let Some(location) = headers
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
    else {
        return;
    };

    if let Some(value) = route
        .relocate(location)
        .and_then(|relocated| HeaderValue::from_str(&relocated).ok())
    {
        headers.insert(header::LOCATION, value);
    }
}

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}
