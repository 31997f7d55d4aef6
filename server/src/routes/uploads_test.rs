use super::*;

#[test]
fn file_key_strips_prefix() {
    assert_eq!(file_key("/files/uploads/a.png"), Some("uploads/a.png"));
    assert_eq!(file_key("/files/"), None);
    assert_eq!(file_key("/uploads/a.png"), Some("uploads/a.png"));
    assert_eq!(file_key("uploads/a.png"), None);
}

#[test]
fn body_limit_leaves_room_for_framing() {
    assert!(UPLOAD_BODY_LIMIT > MAX_UPLOAD_BYTES);
}

#[test]
fn key_query_deserializes() {
    let q: KeyQuery = serde_json::from_value(serde_json::json!({ "key": "uploads/a.png" })).unwrap();
    assert_eq!(q.key, "uploads/a.png");
}

#[cfg(feature = "live-db-tests")]
mod live {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::app;
    use crate::services::session;
    use crate::state::AppState;
    use crate::storage::Storage;
    use crate::storage::memory::MemoryStore;

    async fn signed_in(pool: &sqlx::PgPool) -> (Uuid, String) {
        let email = format!("{}@example.com", Uuid::new_v4());
        let id: Uuid = sqlx::query_scalar("INSERT INTO users (email, name) VALUES ($1, 'Tester') RETURNING id")
            .bind(&email)
            .fetch_one(pool)
            .await
            .unwrap();
        (id, session::create_session(pool, id).await.unwrap())
    }

    fn delete_req(key: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/uploads?key={key}"))
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn another_user_cannot_delete_an_upload() {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL required");
        let pool = crate::db::init_pool(&url, 2).await.expect("pool");
        let (alice, alice_token) = signed_in(&pool).await;
        let (_, bob_token) = signed_in(&pool).await;

        let store = Arc::new(MemoryStore::default());
        let storage = Storage { store: store.clone(), files: None, url_ttl: Duration::from_secs(60) };
        let state = AppState::new(pool, None, storage);
        let stored = crate::services::upload::store_upload(
            store.as_ref(),
            alice,
            vec![1, 2, 3],
            "image/png",
            None,
            Duration::from_secs(60),
        )
        .await
        .unwrap();

        let response = app(state.clone()).oneshot(delete_req(&stored.key, &bob_token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(store.objects.read().await.contains_key(&stored.key));

        let response = app(state).oneshot(delete_req(&stored.key, &alice_token)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.objects.read().await.is_empty());
    }
}
