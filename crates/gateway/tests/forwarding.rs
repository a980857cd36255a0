// Gateway forwarding against a real upstream listener
use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Body,
    extract::OriginalUri,
    http::{Method, Request, StatusCode},
    routing::any,
    Json, Router,
};
use bookstore_gateway::{build_router, GatewayState, HyperUpstream, RouteTable};
use bookstore_kernel::settings::{GatewaySettings, RouteSettings};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Upstream that echoes what it received.
async fn spawn_echo() -> SocketAddr {
    async fn echo(method: Method, OriginalUri(uri): OriginalUri, body: String) -> Json<Value> {
        Json(json!({
            "method": method.as_str(),
            "uri": uri.to_string(),
            "body": body,
        }))
    }

    let app = Router::new().route("/{*path}", any(echo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn gateway(downstream: String) -> Router {
    let settings = GatewaySettings {
        routes: vec![RouteSettings {
            upstream_path: "/books".to_string(),
            downstream_url: downstream,
            methods: vec![],
        }],
        ..GatewaySettings::default()
    };
    let routes = RouteTable::from_settings(&settings.routes).unwrap();
    build_router(
        GatewayState::new(routes, Arc::new(HyperUpstream::new())),
        &settings,
    )
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn forwards_method_path_query_and_body() {
    let addr = spawn_echo().await;
    let app = gateway(format!("http://{addr}/api/books"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/books/7/notes?lang=en")
                .header("origin", "http://frontend.example")
                .header("content-type", "text/plain")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert!(response.headers().contains_key("x-request-id"));

    let echoed = json_body(response).await;
    assert_eq!(echoed["method"], "POST");
    assert_eq!(echoed["uri"], "/api/books/7/notes?lang=en");
    assert_eq!(echoed["body"], "hello");
}

#[tokio::test]
async fn unmatched_path_gets_cors_and_404() {
    let addr = spawn_echo().await;
    let app = gateway(format!("http://{addr}/api/books"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/orders")
                .header("origin", "http://frontend.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    assert_eq!(json_body(response).await["error"]["code"], "not_found");
}

#[tokio::test]
async fn healthz_is_served_locally() {
    let app = gateway("http://127.0.0.1:9/api/books".to_string());

    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn dead_upstream_is_bad_gateway() {
    // Reserve a port, then close it so nothing is listening there.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let app = gateway(format!("http://{addr}/api/books"));
    let response = app
        .oneshot(Request::builder().uri("/books").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"]["code"], "bad_gateway");
}
