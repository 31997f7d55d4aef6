use super::*;

#[test]
fn issue_filter_parses_status_strings() {
    let filter: IssueFilter = serde_json::from_value(serde_json::json!({ "status": "in_progress" })).unwrap();
    assert_eq!(filter.status, Some(IssueStatus::InProgress));
    assert!(filter.business_id.is_none());
}

#[test]
fn issue_filter_rejects_unknown_status() {
    let parsed = serde_json::from_value::<IssueFilter>(serde_json::json!({ "status": "someday" }));
    assert!(parsed.is_err());
}

#[test]
fn issue_columns_select_both_timestamps() {
    assert!(ISSUE_COLUMNS.contains("AS created_at"));
    assert!(ISSUE_COLUMNS.contains("AS updated_at"));
}

#[cfg(feature = "live-db-tests")]
#[tokio::test]
async fn only_active_issues_are_returned_for_equipment() {
    use records::input::{NewBusiness, NewEquipment};

    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL required");
    let pool = crate::db::init_pool(&url, 2).await.expect("pool");
    let email = format!("{}@example.com", Uuid::new_v4());
    let user_id: Uuid = sqlx::query_scalar("INSERT INTO users (email, name) VALUES ($1, 'o') RETURNING id")
        .bind(&email)
        .fetch_one(&pool)
        .await
        .unwrap();
    let user = User { id: user_id, name: "o".into(), email };
    let business = catalog::create_business(
        &pool,
        &user,
        NewBusiness { name: "Diner".into(), address: None, phone: None },
    )
    .await
    .unwrap();
    let equipment = catalog::create_equipment(
        &pool,
        &user,
        NewEquipment {
            business_id: business.id,
            name: "Walk-in".into(),
            manufacturer: "Kolpak".into(),
            model: "KF7".into(),
            category: "refrigeration".into(),
            serial_number: None,
            location: None,
            status: None,
            purchase_date: None,
            notes: None,
        },
    )
    .await
    .unwrap();

    let open = create_issue(
        &pool,
        &user,
        NewIssue {
            business_id: business.id,
            title: "Warm".into(),
            description: "walk-in cooler warm".into(),
            equipment_id: Some(equipment.id),
            problem_id: None,
            priority: None,
        },
    )
    .await
    .unwrap();
    let closed = create_issue(
        &pool,
        &user,
        NewIssue {
            business_id: business.id,
            title: "Door".into(),
            description: "door gasket torn".into(),
            equipment_id: Some(equipment.id),
            problem_id: None,
            priority: Some(IssuePriority::Low),
        },
    )
    .await
    .unwrap();
    update_issue(
        &pool,
        &user,
        closed.id,
        IssuePatch { status: Some(IssueStatus::Closed), ..Default::default() },
    )
    .await
    .unwrap();

    let active = active_issues_for_equipment(&pool, equipment.id).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, open.id);
}
