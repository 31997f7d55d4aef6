use super::*;

#[test]
fn require_text_trims_and_rejects_blank() {
    assert_eq!(require_text("name", "  Fryer 1 ").unwrap(), "Fryer 1");
    let err = require_text("name", "   ").unwrap_err();
    assert!(matches!(err, CatalogError::Validation(ref m) if m == "name must not be empty"));
}

#[test]
fn optional_text_maps_blank_to_none() {
    assert_eq!(optional_text(None), None);
    assert_eq!(optional_text(Some("  ")), None);
    assert_eq!(optional_text(Some(" Line 2 ")), Some("Line 2".to_owned()));
}

#[test]
fn access_can_manage() {
    assert!(Access::Owner.can_manage());
    assert!(Access::Employee(EmployeeRole::Owner).can_manage());
    assert!(Access::Employee(EmployeeRole::Manager).can_manage());
    assert!(!Access::Employee(EmployeeRole::Staff).can_manage());
}

#[test]
fn catalog_error_statuses() {
    assert_eq!(CatalogError::NotFound("business", Uuid::nil()).status(), StatusCode::NOT_FOUND);
    assert_eq!(CatalogError::Forbidden("x").status(), StatusCode::FORBIDDEN);
    assert_eq!(CatalogError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(CatalogError::Validation("x".into()).error_code(), "E_VALIDATION");
}

#[test]
fn not_found_message_names_resource() {
    let id = Uuid::nil();
    assert_eq!(CatalogError::NotFound("equipment", id).to_string(), format!("equipment not found: {id}"));
}

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;

    async fn pool() -> PgPool {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL required");
        crate::db::init_pool(&url, 2).await.expect("pool")
    }

    async fn user(pool: &PgPool) -> User {
        let email = format!("{}@example.com", Uuid::new_v4());
        let id: Uuid = sqlx::query_scalar("INSERT INTO users (email, name) VALUES ($1, 'Owner') RETURNING id")
            .bind(&email)
            .fetch_one(pool)
            .await
            .unwrap();
        User { id, name: "Owner".into(), email }
    }

    #[tokio::test]
    async fn owner_and_employee_access() {
        let pool = pool().await;
        let owner = user(&pool).await;
        let staff = user(&pool).await;
        let stranger = user(&pool).await;

        let business = create_business(
            &pool,
            &owner,
            NewBusiness { name: "Bistro".into(), address: None, phone: None },
        )
        .await
        .unwrap();
        add_employee(
            &pool,
            &owner,
            business.id,
            NewEmployee { name: "Sam".into(), email: Some(staff.email.clone()), role: EmployeeRole::Staff },
        )
        .await
        .unwrap();

        assert_eq!(access(&pool, &owner, business.id).await.unwrap(), Access::Owner);
        assert_eq!(
            access(&pool, &staff, business.id).await.unwrap(),
            Access::Employee(EmployeeRole::Staff)
        );
        assert!(matches!(access(&pool, &stranger, business.id).await, Err(CatalogError::Forbidden(_))));
        assert!(matches!(
            delete_business(&pool, &staff, business.id).await,
            Err(CatalogError::Forbidden(_))
        ));
    }
}
