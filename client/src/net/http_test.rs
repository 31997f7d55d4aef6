use std::sync::atomic::AtomicUsize;

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;

use super::*;
use crate::net::test_server;

fn counting_hook(client: &HttpClient) -> Arc<AtomicUsize> {
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    client.on_sign_out(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    fired
}

async fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "unauthorized", "code": "E_UNAUTHORIZED" })),
    )
}

async fn echo_auth(headers: HeaderMap) -> Json<serde_json::Value> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    Json(serde_json::json!({ "authorization": auth }))
}

async fn missing() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "issue not found", "code": "E_NOT_FOUND" })),
    )
}

async fn server() -> String {
    test_server::spawn(
        axum::Router::new()
            .route("/api/auth/me", get(unauthorized))
            .route("/api/echo", get(echo_auth))
            .route("/api/missing", get(missing)),
    )
    .await
}

#[test]
fn base_url_requires_http_scheme() {
    assert!(matches!(HttpClient::new("localhost:3000"), Err(ClientError::BaseUrl(_))));
    assert!(matches!(HttpClient::new("http://"), Err(ClientError::BaseUrl(_))));
    assert!(HttpClient::new("https://fixdesk.example.com").is_ok());
}

#[test]
fn url_joins_paths_without_double_slash() {
    let client = HttpClient::new("http://127.0.0.1:3000/").unwrap();
    assert_eq!(client.base_url(), "http://127.0.0.1:3000");
    assert_eq!(client.url("/api/issues"), "http://127.0.0.1:3000/api/issues");
    assert_eq!(client.url("healthz"), "http://127.0.0.1:3000/healthz");
}

#[test]
fn sign_out_hook_fires_once_per_session() {
    let client = HttpClient::new("http://127.0.0.1:3000").unwrap();
    let fired = counting_hook(&client);

    assert!(!client.expire_session(), "no session to expire yet");
    client.sign_in("tok-1");
    assert!(client.expire_session());
    assert!(!client.expire_session());
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(client.token().is_none());

    client.sign_in("tok-2");
    assert!(client.expire_session());
    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[test]
fn explicit_sign_out_does_not_run_hook() {
    let client = HttpClient::new("http://127.0.0.1:3000").unwrap();
    let fired = counting_hook(&client);
    client.sign_in("tok");
    client.sign_out();
    assert!(!client.is_signed_in());
    assert!(!client.expire_session());
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_401s_sign_out_exactly_once() {
    let client = HttpClient::new(&server().await).unwrap();
    let fired = counting_hook(&client);
    client.sign_in("stale-token");

    for _ in 0..3 {
        let err = client.get::<serde_json::Value>("/api/auth/me").await.unwrap_err();
        assert!(matches!(err, ClientError::Unauthorized));
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(!client.is_signed_in());
}

#[tokio::test]
async fn concurrent_401s_sign_out_exactly_once() {
    let client = HttpClient::new(&server().await).unwrap();
    let fired = counting_hook(&client);
    client.sign_in("stale-token");

    let calls = (0..8).map(|_| {
        let client = client.clone();
        tokio::spawn(async move { client.get::<serde_json::Value>("/api/auth/me").await })
    });
    for call in calls.collect::<Vec<_>>() {
        assert!(matches!(call.await.unwrap(), Err(ClientError::Unauthorized)));
    }
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn bearer_token_is_attached_when_signed_in() {
    let client = HttpClient::new(&server().await).unwrap();

    let anonymous: serde_json::Value = client.get("/api/echo").await.unwrap();
    assert!(anonymous["authorization"].is_null());

    client.sign_in("abc123");
    let authed: serde_json::Value = client.get("/api/echo").await.unwrap();
    assert_eq!(authed["authorization"], "Bearer abc123");
}

#[tokio::test]
async fn error_status_carries_server_code() {
    let client = HttpClient::new(&server().await).unwrap();
    let err = client.get::<serde_json::Value>("/api/missing").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), Some("E_NOT_FOUND"));
}
