use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use tower::ServiceExt;

use super::*;
use crate::state::test_helpers;
use crate::storage::{LocalFiles, UrlSigner};

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, body)
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn healthz_is_ok() {
    let (status, _) = send(app(test_helpers::test_app_state()), get_req("/healthz")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn api_requires_a_token() {
    for (method, uri) in [
        ("GET", "/api/auth/me"),
        ("POST", "/api/chat/sessions"),
        ("GET", "/api/businesses"),
        ("GET", "/api/technicians"),
        ("DELETE", "/api/uploads?key=uploads/a.png"),
    ] {
        let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let (status, body) = send(app(test_helpers::test_app_state()), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{method} {uri}");
        let err: records::ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.code, "E_UNAUTHORIZED");
    }
}

#[tokio::test]
async fn malformed_json_is_a_400_envelope() {
    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/email/request-code")
        .header("content-type", "application/json")
        .body(Body::from("{\"email\": "))
        .unwrap();
    let (status, body) = send(app(test_helpers::test_app_state()), req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: records::ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(err.code, "E_BAD_REQUEST");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _) = send(app(test_helpers::test_app_state()), get_req("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn files_are_absent_without_local_backend() {
    let (status, _) = send(app(test_helpers::test_app_state()), get_req("/files/uploads/a.png")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

fn local_state(dir: &std::path::Path) -> (crate::state::AppState, UrlSigner) {
    let signer = UrlSigner::new("test-secret");
    let mut state = test_helpers::test_app_state();
    state.files = Some(LocalFiles { root: dir.to_path_buf(), signer: signer.clone() });
    (state, signer)
}

#[tokio::test]
async fn signed_file_link_serves_the_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
    std::fs::write(dir.path().join("uploads/manual.pdf"), b"%PDF-1.4").unwrap();
    let (state, signer) = local_state(dir.path());

    let uri = format!("/files/uploads/manual.pdf?{}", signer.query("uploads/manual.pdf", Duration::from_secs(60)));
    let (status, body) = send(app(state), get_req(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"%PDF-1.4");
}

#[tokio::test]
async fn unsigned_or_tampered_file_link_is_forbidden() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("uploads")).unwrap();
    std::fs::write(dir.path().join("uploads/a.png"), b"png").unwrap();
    let (state, signer) = local_state(dir.path());

    let (status, _) = send(app(state.clone()), get_req("/files/uploads/a.png")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Signature for a different key.
    let other = signer.query("uploads/b.png", Duration::from_secs(60));
    let (status, _) = send(app(state.clone()), get_req(&format!("/files/uploads/a.png?{other}"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Expired.
    let expires = 1;
    let sig = signer.sign("uploads/a.png", expires);
    let (status, _) = send(app(state), get_req(&format!("/files/uploads/a.png?expires={expires}&sig={sig}"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
