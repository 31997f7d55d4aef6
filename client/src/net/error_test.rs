use super::*;

#[test]
fn error_body_is_decoded() {
    let body = br#"{"error":"equipment not found","code":"E_NOT_FOUND"}"#;
    let err = ClientError::from_response(StatusCode::NOT_FOUND, body);
    assert_eq!(err.status(), Some(404));
    assert_eq!(err.code(), Some("E_NOT_FOUND"));
    assert_eq!(err.to_string(), "equipment not found");
}

#[test]
fn plain_text_body_becomes_message() {
    let err = ClientError::from_response(StatusCode::BAD_GATEWAY, b"upstream down\n");
    assert_eq!(err.to_string(), "upstream down");
    assert_eq!(err.code(), Some(""));
}

#[test]
fn empty_body_falls_back_to_reason_phrase() {
    let err = ClientError::from_response(StatusCode::SERVICE_UNAVAILABLE, b"");
    assert_eq!(err.to_string(), "Service Unavailable");
}

#[test]
fn unauthorized_reports_401() {
    assert_eq!(ClientError::Unauthorized.status(), Some(401));
    assert!(ClientError::Unauthorized.code().is_none());
}
