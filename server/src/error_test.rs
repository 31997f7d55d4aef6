use super::*;
use http_body_util::BodyExt;

#[derive(Debug, thiserror::Error)]
#[error("widget {0} missing")]
struct MissingWidget(u32);

impl ErrorCode for MissingWidget {
    fn error_code(&self) -> &'static str {
        "E_WIDGET_NOT_FOUND"
    }

    fn status(&self) -> StatusCode {
        StatusCode::NOT_FOUND
    }
}

#[derive(Debug, thiserror::Error)]
#[error("connection refused to 10.0.0.3")]
struct Exploded;

impl ErrorCode for Exploded {
    fn error_code(&self) -> &'static str {
        "E_DATABASE"
    }

    fn retryable(&self) -> bool {
        true
    }
}

async fn body_of(err: ApiError) -> (StatusCode, ErrorBody) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn typed_error_keeps_code_and_status() {
    let (status, body) = body_of(ApiError::from(MissingWidget(7))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body.code, "E_WIDGET_NOT_FOUND");
    assert_eq!(body.error, "widget 7 missing");
    assert!(!body.retryable);
}

#[tokio::test]
async fn internal_error_hides_message() {
    let (status, body) = body_of(ApiError::from(Exploded)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.code, "E_DATABASE");
    assert_eq!(body.error, "internal server error");
    assert!(body.retryable);
}

#[tokio::test]
async fn unauthorized_helper() {
    let (status, body) = body_of(ApiError::unauthorized()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.code, "E_UNAUTHORIZED");
}

#[tokio::test]
async fn api_json_rejects_malformed_body_with_envelope() {
    #[derive(Debug, serde::Deserialize)]
    struct Body {
        #[allow(dead_code)]
        name: String,
    }

    let req = Request::builder()
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"nom":"x"}"#))
        .unwrap();
    let Err(err) = ApiJson::<Body>::from_request(req, &()).await else {
        panic!("expected rejection");
    };
    let (status, body) = body_of(err).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.code, "E_BAD_REQUEST");
}

#[tokio::test]
async fn api_json_accepts_valid_body() {
    let req = Request::builder()
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"email":"a@b.c"}"#))
        .unwrap();
    let Ok(ApiJson(body)) = ApiJson::<records::input::RequestCode>::from_request(req, &()).await else {
        panic!("expected success");
    };
    assert_eq!(body.email, "a@b.c");
}
