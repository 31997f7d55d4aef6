use axum::Json;
use axum::extract::Multipart;
use axum::http::StatusCode;
use axum::routing::post;
use serde_json::{Value, json};

use super::*;
use crate::net::test_server;

async fn verify(Json(body): Json<Value>) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    if body["code"] != "ABC123" {
        return Err((StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid code", "code": "E_INVALID_CODE" }))));
    }
    Ok(Json(json!({
        "token": "session-token",
        "user": { "id": Uuid::nil(), "name": "Pat", "email": body["email"] }
    })))
}

async fn upload(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    let mut folder = None;
    let mut file = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("folder") => folder = Some(field.text().await.unwrap()),
            Some("file") => {
                let content_type = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.unwrap();
                file = Some((content_type, bytes.len()));
            }
            _ => {}
        }
    }
    let (content_type, len) = file.unwrap();
    assert_eq!(content_type.as_deref(), Some("image/png"));
    assert_eq!(len, 4);
    let key = format!("{}/photo.png", folder.unwrap_or_else(|| "uploads".into()));
    (StatusCode::CREATED, Json(json!({ "key": key, "url": "http://files/x" })))
}

async fn server() -> String {
    test_server::spawn(
        axum::Router::new()
            .route("/api/auth/email/verify-code", post(verify))
            .route("/api/auth/logout", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/api/uploads", post(upload)),
    )
    .await
}

#[tokio::test]
async fn verify_code_signs_the_shared_client_in() {
    let http = HttpClient::new(&server().await).unwrap();
    let api = ServerApi::new(http.clone());

    let signed = api.verify_code(" pat@example.com ", "ABC123").await.unwrap();
    assert_eq!(signed.user.email, "pat@example.com");
    assert!(http.is_signed_in());
    assert_eq!(http.token().as_deref(), Some("session-token"));
}

#[tokio::test]
async fn wrong_code_leaves_client_signed_out() {
    let http = HttpClient::new(&server().await).unwrap();
    let api = ServerApi::new(http.clone());

    let err = api.verify_code("pat@example.com", "nope").await.unwrap_err();
    assert_eq!(err.code(), Some("E_INVALID_CODE"));
    assert!(!http.is_signed_in());
}

#[tokio::test]
async fn logout_forgets_token_even_when_server_fails() {
    let http = HttpClient::new(&server().await).unwrap();
    http.sign_in("tok");
    let api = ServerApi::new(http.clone());

    assert!(api.logout().await.is_err());
    assert!(!http.is_signed_in());
    assert!(http.token().is_none());
}

#[tokio::test]
async fn upload_sends_file_and_folder_fields() {
    let api = ServerApi::new(HttpClient::new(&server().await).unwrap());
    let stored = api
        .upload(vec![0x89, b'P', b'N', b'G'], "photo.png", "image/png", Some("equipment"))
        .await
        .unwrap();
    assert_eq!(stored.key, "equipment/photo.png");
}

#[test]
fn problem_query_skips_unset_filters() {
    let query = ProblemQuery { category: Some("refrigeration".into()), ..ProblemQuery::default() };
    assert_eq!(serde_json::to_value(query).unwrap(), json!({ "category": "refrigeration" }));
}
