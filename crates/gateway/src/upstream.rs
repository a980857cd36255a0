use async_trait::async_trait;
use axum::body::Body;
use hyper::{Request, Response};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tracing::Instrument;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    /// The upstream could not be reached or the exchange failed mid-flight
    #[error("upstream request to {uri} failed: {reason}")]
    Connection { uri: String, reason: String },

    /// The outbound request could not be built
    #[error("invalid outbound request: {0}")]
    InvalidRequest(String),
}

/// Sends a fully-rewritten request to its downstream service.
#[async_trait]
pub trait Upstream: Send + Sync + 'static {
    async fn send(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError>;
}

/// HTTP/1.1 client over plain TCP or rustls, backed by hyper-util's pooled
/// legacy client. TLS trusts the platform's native root certificates.
#[derive(Clone)]
pub struct HyperUpstream {
    client: Client<HttpsConnector<HttpConnector>, Body>,
}

impl HyperUpstream {
    pub fn new() -> Self {
        // Another component may already have installed a provider.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http = HttpConnector::new();
        http.enforce_http(false);

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(
                rustls::ClientConfig::builder()
                    .with_root_certificates(native_roots())
                    .with_no_client_auth(),
            )
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build::<_, Body>(connector);
        Self { client }
    }
}

fn native_roots() -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();

    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    if !native.errors.is_empty() || ignored > 0 {
        tracing::warn!(
            errors = native.errors.len(),
            ignored,
            "some native root certificates could not be loaded"
        );
    }
    tracing::debug!(added, "loaded native root certificates");
    roots
}

impl Default for HyperUpstream {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Upstream for HyperUpstream {
    async fn send(&self, req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        if req.uri().host().is_none() {
            return Err(ProxyError::InvalidRequest(format!(
                "outgoing uri '{}' has no host",
                req.uri()
            )));
        }

        let uri = req.uri().to_string();
        let method = req.method().clone();
        let span = tracing::info_span!(
            "upstream_request",
            http.method = %method,
            upstream.uri = %uri,
            http.status_code = tracing::field::Empty,
        );

        match self.client.request(req).instrument(span.clone()).await {
            Ok(response) => {
                span.record("http.status_code", response.status().as_u16());
                Ok(response.map(Body::new))
            }
            Err(err) => {
                tracing::error!(parent: &span, error = %err, "upstream request failed");
                Err(ProxyError::Connection {
                    uri,
                    reason: err.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{io::AsyncReadExt, net::TcpListener};

    #[tokio::test]
    async fn https_downstream_starts_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let first_byte = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.read_u8().await.unwrap()
        });

        let request = Request::builder()
            .uri(format!("https://{addr}/api/books"))
            .body(Body::empty())
            .unwrap();
        let result = HyperUpstream::new().send(request).await;

        // 0x16 opens a TLS handshake record (ClientHello).
        assert_eq!(first_byte.await.unwrap(), 0x16);
        assert!(matches!(result, Err(ProxyError::Connection { .. })));
    }

    #[tokio::test]
    async fn uri_without_host_is_rejected() {
        let request = Request::builder()
            .uri("/api/books")
            .body(Body::empty())
            .unwrap();

        let result = HyperUpstream::new().send(request).await;
        assert!(matches!(result, Err(ProxyError::InvalidRequest(_))));
    }
}
