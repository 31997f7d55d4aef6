use super::*;

#[test]
fn normalize_email_accepts_basic_address() {
    assert_eq!(normalize_email("  Chef@Bistro.com "), Some("chef@bistro.com".to_owned()));
}

#[test]
fn normalize_email_rejects_invalid_values() {
    assert_eq!(normalize_email(""), None);
    assert_eq!(normalize_email("chef"), None);
    assert_eq!(normalize_email("@bistro.com"), None);
    assert_eq!(normalize_email("chef@"), None);
    assert_eq!(normalize_email("a@b@c"), None);
}

#[test]
fn normalize_code_uppercases() {
    let code = generate_access_code();
    assert_eq!(normalize_code(&code), Some(code.clone()));
    assert_eq!(normalize_code(" abc234 "), Some("ABC234".to_owned()));
}

#[test]
fn normalize_code_rejects_bad_shapes() {
    assert_eq!(normalize_code("abc23"), None);
    assert_eq!(normalize_code("abc2345"), None);
    // I, 1, O and 0 are excluded from the alphabet.
    assert_eq!(normalize_code("ABC1I0"), None);
    assert_eq!(normalize_code("ABC23!"), None);
}

#[test]
fn generate_access_code_shape() {
    let code = generate_access_code();
    assert_eq!(code.len(), CODE_LEN);
    assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
}

#[test]
fn hash_access_code_is_stable_hex() {
    let a = hash_access_code("ABC234");
    assert_eq!(a, hash_access_code("ABC234"));
    assert_ne!(a, hash_access_code("ABC235"));
    assert_eq!(a.len(), 64);
}

#[test]
fn name_from_email_uses_local_part() {
    assert_eq!(name_from_email("chef@bistro.com"), "chef");
}

#[test]
fn render_email_includes_code_and_address() {
    let html = render_access_code_email("chef@bistro.com", "XY23AB");
    assert!(html.contains("XY23AB"));
    assert!(html.contains("chef@bistro.com"));
}

#[test]
fn error_statuses() {
    assert_eq!(EmailAuthError::InvalidEmail.status(), StatusCode::BAD_REQUEST);
    assert_eq!(EmailAuthError::VerificationFailed.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(EmailAuthError::EmailDelivery("x".into()).status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn deliver_without_config_logs_and_succeeds() {
    assert!(deliver_access_code(None, "chef@bistro.com", "ABC234").await.is_ok());
}
