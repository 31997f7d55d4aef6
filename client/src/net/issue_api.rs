//! Service tickets.

use records::input::{IssuePatch, NewIssue};
use records::{Issue, IssueStatus};
use serde::Serialize;
use uuid::Uuid;

use super::error::ClientError;
use super::http::HttpClient;
use super::logged;

const ISSUES_PATH: &str = "/api/issues";

/// Filters for [`IssueApi::list_issues`]. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssueQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub equipment_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<IssueStatus>,
}

fn issue_path(id: Uuid) -> String {
    format!("{ISSUES_PATH}/{id}")
}

#[derive(Debug, Clone)]
pub struct IssueApi {
    http: HttpClient,
}

impl IssueApi {
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub async fn list_issues(&self, query: &IssueQuery) -> Result<Vec<Issue>, ClientError> {
        logged("list_issues", self.http.get_query(ISSUES_PATH, query).await)
    }

    pub async fn get_issue(&self, id: Uuid) -> Result<Issue, ClientError> {
        logged("get_issue", self.http.get(&issue_path(id)).await)
    }

    pub async fn create_issue(&self, input: &NewIssue) -> Result<Issue, ClientError> {
        logged("create_issue", self.http.post(ISSUES_PATH, input).await)
    }

    pub async fn update_issue(&self, id: Uuid, patch: &IssuePatch) -> Result<Issue, ClientError> {
        logged("update_issue", self.http.patch(&issue_path(id), patch).await)
    }

    /// Assign a technician and move the ticket to `in_progress`.
    pub async fn assign_technician(&self, id: Uuid, technician_id: Uuid) -> Result<Issue, ClientError> {
        let patch = IssuePatch {
            technician_id: Some(technician_id),
            status: Some(IssueStatus::InProgress),
            ..IssuePatch::default()
        };
        self.update_issue(id, &patch).await
    }

    pub async fn delete_issue(&self, id: Uuid) -> Result<(), ClientError> {
        logged("delete_issue", self.http.delete(&issue_path(id)).await)
    }
}

#[cfg(test)]
#[path = "issue_api_test.rs"]
mod tests;
