//! Known problems, their solutions, service tickets, and technicians.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

string_enum! {
    /// Who produced a solution.
    ResolvedBy: "resolved by" {
        Ai => "ai",
        Community => "community",
        Business => "business",
        Technician => "technician",
    }
}

string_enum! {
    IssueStatus: "issue status" {
        Open => "open",
        InProgress => "in_progress",
        Resolved => "resolved",
        Closed => "closed",
    }
}

string_enum! {
    IssuePriority: "issue priority" {
        Low => "low",
        Medium => "medium",
        High => "high",
        Urgent => "urgent",
    }
}

impl IssueStatus {
    /// Open and in-progress issues still need work.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub id: Uuid,
    pub problem_id: Uuid,
    pub cause: String,
    pub treatment: String,
    pub cost: Option<f64>,
    pub resolved_by: ResolvedBy,
    /// Externally supplied score in `0.0..=5.0`.
    pub effectiveness: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    pub id: Uuid,
    pub description: String,
    pub equipment_id: Option<Uuid>,
    pub category: Option<String>,
    pub created_at: i64,
    #[serde(default)]
    pub solutions: Vec<Solution>,
}

/// A service ticket raised against a business (and usually a machine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub business_id: Uuid,
    pub equipment_id: Option<Uuid>,
    pub problem_id: Option<Uuid>,
    pub technician_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Technician {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub specialties: Vec<String>,
    /// Mean review score, `0.0` while unreviewed.
    pub rating: f64,
    pub review_count: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechnicianReview {
    pub id: Uuid,
    pub technician_id: Uuid,
    pub issue_id: Option<Uuid>,
    /// 1 through 5.
    pub score: i16,
    pub comment: Option<String>,
    pub created_at: i64,
}
