use super::*;

// =============================================================================
// bytes_to_hex
// =============================================================================

#[test]
fn bytes_to_hex_empty() {
    assert_eq!(bytes_to_hex(&[]), "");
}

#[test]
fn bytes_to_hex_leading_zero() {
    assert_eq!(bytes_to_hex(&[0x0a]), "0a");
}

#[test]
fn bytes_to_hex_multi_byte() {
    assert_eq!(bytes_to_hex(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
}

// =============================================================================
// generate_token
// =============================================================================

#[test]
fn generate_token_is_64_hex_chars() {
    let token = generate_token();
    assert_eq!(token.len(), 64);
    assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn generate_token_is_unique() {
    assert_ne!(generate_token(), generate_token());
}

// =============================================================================
// parse_bearer
// =============================================================================

#[test]
fn parse_bearer_accepts_any_case_scheme() {
    assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
    assert_eq!(parse_bearer("bearer   abc  "), Some("abc"));
}

#[test]
fn parse_bearer_rejects_other_schemes_and_blanks() {
    assert_eq!(parse_bearer("Basic abc"), None);
    assert_eq!(parse_bearer("Bearer"), None);
    assert_eq!(parse_bearer("Bearer    "), None);
    assert_eq!(parse_bearer(""), None);
}

// =============================================================================
// live database
// =============================================================================

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn session_round_trip() {
    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL required");
    let pool = crate::db::init_pool(&url, 2).await.expect("pool");
    let email = format!("{}@example.com", Uuid::new_v4());
    let user_id: Uuid = sqlx::query_scalar("INSERT INTO users (email, name) VALUES ($1, 'Test') RETURNING id")
        .bind(&email)
        .fetch_one(&pool)
        .await
        .unwrap();

    let token = create_session(&pool, user_id).await.unwrap();
    let user = validate_session(&pool, &token).await.unwrap().unwrap();
    assert_eq!(user.id, user_id);
    assert_eq!(user.email, email);

    delete_session(&pool, &token).await.unwrap();
    assert!(validate_session(&pool, &token).await.unwrap().is_none());
}
