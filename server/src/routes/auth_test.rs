use super::*;
use axum::http::Request;

fn parts(builder: axum::http::request::Builder) -> Parts {
    builder.body(()).unwrap().into_parts().0
}

#[test]
fn bearer_header_is_preferred() {
    let p = parts(
        Request::builder()
            .header(AUTHORIZATION, "Bearer abc123")
            .header("cookie", "session_token=from-cookie"),
    );
    assert_eq!(request_token(&p).as_deref(), Some("abc123"));
}

#[test]
fn cookie_is_used_without_header() {
    let p = parts(Request::builder().header("cookie", "theme=dark; session_token=tok"));
    assert_eq!(request_token(&p).as_deref(), Some("tok"));
}

#[test]
fn missing_or_empty_token_is_none() {
    assert_eq!(request_token(&parts(Request::builder())), None);
    let p = parts(Request::builder().header("cookie", "session_token="));
    assert_eq!(request_token(&p), None);
    let p = parts(Request::builder().header(AUTHORIZATION, "Basic dXNlcjpwYXNz"));
    assert_eq!(request_token(&p), None);
}

#[test]
fn cleared_cookie_expires_immediately() {
    let cookie = session_cookie(String::new(), Duration::ZERO);
    assert_eq!(cookie.name(), COOKIE_NAME);
    assert_eq!(cookie.value(), "");
    assert_eq!(cookie.max_age(), Some(Duration::ZERO));
    assert_eq!(cookie.http_only(), Some(true));
    assert_eq!(cookie.path(), Some("/"));
}
