//! Integration tests for the HTTP endpoints.
//!
//! These tests start a real HTTP server and make actual requests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use axum::http::StatusCode;
use serde_json::{Value, json};
use snapkv::{AppState, Store};
use std::net::SocketAddr;
use std::sync::Arc;

/// Start test HTTP server on random port.
async fn start_test_server() -> (SocketAddr, Arc<Store>) {
    // Install ring crypto provider for reqwest (idempotent)
    let _ = rustls::crypto::ring::default_provider().install_default();

    let store = Arc::new(Store::new());
    let state = Arc::new(AppState::new(Arc::clone(&store)));
    let app = snapkv::http::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind HTTP listener");
    let addr = listener
        .local_addr()
        .expect("Failed to get listener address");

    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("HTTP server failed to run");
    });

    (addr, store)
}

async fn json_body(response: reqwest::Response) -> Value {
    let content_type = response
        .headers()
        .get("content-type")
        .expect("Response should have content-type header")
        .to_str()
        .expect("Content-Type header should be valid UTF-8")
        .to_string();
    assert!(content_type.contains("application/json"));

    response
        .json()
        .await
        .expect("Response body should be JSON")
}

#[tokio::test]
async fn test_set_get_count_scenario() {
    let (addr, store) = start_test_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/set"))
        .json(&json!({"key": "a", "value": "1"}))
        .send()
        .await
        .expect("Failed to send POST /set");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"status": "OK"}));

    let response = client
        .get(format!("http://{addr}/get?key=a"))
        .send()
        .await
        .expect("Failed to send GET /get");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"key": "a", "value": "1"}));

    let response = client
        .get(format!("http://{addr}/count"))
        .send()
        .await
        .expect("Failed to send GET /count");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"count": 1}));

    let response = client
        .get(format!("http://{addr}/get?key=missing"))
        .send()
        .await
        .expect("Failed to send GET /get");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({"error": "Key not found"}));

    assert!(store.is_dirty());
}

#[tokio::test]
async fn test_set_accepts_body_without_content_type() {
    let (addr, store) = start_test_server().await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/set"))
        .body(r#"{"key":"plain","value":""}"#)
        .send()
        .await
        .expect("Failed to send POST /set");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(store.get("plain").as_deref(), Some(""));
}

#[tokio::test]
async fn test_set_rejects_bad_input() {
    let (addr, store) = start_test_server().await;
    let client = reqwest::Client::new();

    let cases = [
        ("not json", "Error parsing JSON"),
        (r#"{"key":"a","value":7}"#, "Error parsing JSON"),
        (r#"{"value":"1"}"#, "Missing key"),
        (r#"{"key":"","value":"1"}"#, "Missing key"),
    ];

    for (body, message) in cases {
        let response = client
            .post(format!("http://{addr}/set"))
            .body(body)
            .send()
            .await
            .expect("Failed to send POST /set");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(json_body(response).await, json!({"error": message}));
    }

    assert_eq!(store.count(), 0);
}

#[tokio::test]
async fn test_get_without_key_is_bad_request() {
    let (addr, _store) = start_test_server().await;
    let client = reqwest::Client::new();

    for path in ["/get", "/get?key=", "/get?other=1"] {
        let response = client
            .get(format!("http://{addr}{path}"))
            .send()
            .await
            .expect("Failed to send GET /get");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "path: {path}");
        assert_eq!(json_body(response).await, json!({"error": "Missing key"}));
    }
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let (addr, _store) = start_test_server().await;
    let client = reqwest::Client::new();

    let requests = [
        client.get(format!("http://{addr}/set")),
        client.post(format!("http://{addr}/get?key=a")),
        client.delete(format!("http://{addr}/count")),
    ];

    for request in requests {
        let response = request.send().await.expect("Failed to send request");
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Method not allowed"})
        );
    }
}

#[tokio::test]
async fn test_concurrent_sets_are_all_visible() {
    let (addr, store) = start_test_server().await;
    let client = reqwest::Client::new();

    let requests = (0..50).map(|i| {
        let client = client.clone();
        async move {
            client
                .post(format!("http://{addr}/set"))
                .json(&json!({"key": format!("k{i}"), "value": format!("v{i}")}))
                .send()
                .await
                .expect("Failed to send POST /set")
                .status()
        }
    });

    let handles: Vec<_> = requests.map(tokio::spawn).collect();
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    let response = client
        .get(format!("http://{addr}/count"))
        .send()
        .await
        .expect("Failed to send GET /count");
    assert_eq!(json_body(response).await, json!({"count": 50}));
    assert_eq!(store.get("k42").as_deref(), Some("v42"));
}
