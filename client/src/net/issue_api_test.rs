use axum::Json;
use axum::extract::RawQuery;
use axum::routing::get;

use super::*;
use crate::net::test_server;

#[test]
fn issue_paths() {
    let id = Uuid::nil();
    assert_eq!(issue_path(id), "/api/issues/00000000-0000-0000-0000-000000000000");
}

#[test]
fn empty_query_serializes_to_nothing() {
    let value = serde_json::to_value(IssueQuery::default()).unwrap();
    assert_eq!(value, serde_json::json!({}));
}

#[tokio::test]
async fn list_issues_sends_only_set_filters() {
    async fn echo_query(RawQuery(query): RawQuery) -> Json<Vec<serde_json::Value>> {
        assert_eq!(query.as_deref(), Some("status=in_progress"));
        Json(Vec::new())
    }
    let base = test_server::spawn(axum::Router::new().route("/api/issues", get(echo_query))).await;
    let api = IssueApi::new(HttpClient::new(&base).unwrap());

    let query = IssueQuery { status: Some(IssueStatus::InProgress), ..IssueQuery::default() };
    assert!(api.list_issues(&query).await.unwrap().is_empty());
}
