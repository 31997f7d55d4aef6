//! Service tickets raised against a business.

use records::input::{IssuePatch, NewIssue};
use records::{Issue, IssuePriority, IssueStatus, User};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::catalog::{self, CatalogError, require_text};
use crate::db::parse_enum;

/// Query filters for [`list_issues`].
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct IssueFilter {
    pub business_id: Option<Uuid>,
    pub equipment_id: Option<Uuid>,
    pub status: Option<IssueStatus>,
}

const ISSUE_COLUMNS: &str = "id, business_id, equipment_id, problem_id, technician_id, title, description, \
     status, priority, \
     (extract(epoch from created_at) * 1000)::bigint AS created_at, \
     (extract(epoch from updated_at) * 1000)::bigint AS updated_at";

fn issue_from_row(row: &PgRow) -> Result<Issue, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    Ok(Issue {
        id: row.try_get("id")?,
        business_id: row.try_get("business_id")?,
        equipment_id: row.try_get("equipment_id")?,
        problem_id: row.try_get("problem_id")?,
        technician_id: row.try_get("technician_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        status: parse_enum(&status)?,
        priority: parse_enum(&priority)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Open and in-progress tickets on one machine, newest first.
pub(crate) async fn active_issues_for_equipment(pool: &PgPool, equipment_id: Uuid) -> Result<Vec<Issue>, sqlx::Error> {
    let rows = sqlx::query(&format!(
        "SELECT {ISSUE_COLUMNS} FROM issues
         WHERE equipment_id = $1 AND status IN ('open', 'in_progress')
         ORDER BY created_at DESC"
    ))
    .bind(equipment_id)
    .fetch_all(pool)
    .await?;
    rows.iter().map(issue_from_row).collect()
}

pub async fn list_issues(pool: &PgPool, user: &User, filter: IssueFilter) -> Result<Vec<Issue>, CatalogError> {
    let business_ids = match filter.business_id {
        Some(id) => {
            catalog::access(pool, user, id).await?;
            vec![id]
        }
        None => catalog::member_business_ids(pool, user).await?,
    };
    let rows = sqlx::query(&format!(
        "SELECT {ISSUE_COLUMNS} FROM issues
         WHERE business_id = ANY($1)
           AND ($2::uuid IS NULL OR equipment_id = $2)
           AND ($3::text IS NULL OR status = $3)
         ORDER BY updated_at DESC"
    ))
    .bind(&business_ids)
    .bind(filter.equipment_id)
    .bind(filter.status.map(IssueStatus::as_str))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(issue_from_row).collect::<Result<_, _>>()?)
}

pub async fn get_issue(pool: &PgPool, user: &User, id: Uuid) -> Result<Issue, CatalogError> {
    let row = sqlx::query(&format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(CatalogError::NotFound("issue", id))?;
    let issue = issue_from_row(&row)?;
    catalog::access(pool, user, issue.business_id).await?;
    Ok(issue)
}

pub async fn create_issue(pool: &PgPool, user: &User, input: NewIssue) -> Result<Issue, CatalogError> {
    catalog::access(pool, user, input.business_id).await?;
    let title = require_text("title", &input.title)?;
    let description = require_text("description", &input.description)?;
    if let Some(equipment_id) = input.equipment_id {
        let equipment = catalog::load_equipment(pool, equipment_id).await?;
        if equipment.business_id != input.business_id {
            return Err(CatalogError::Validation("equipment belongs to another business".into()));
        }
    }
    let priority = input.priority.unwrap_or(IssuePriority::Medium);

    let row = sqlx::query(&format!(
        "INSERT INTO issues (id, business_id, equipment_id, problem_id, title, description, status, priority)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {ISSUE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.business_id)
    .bind(input.equipment_id)
    .bind(input.problem_id)
    .bind(title)
    .bind(description)
    .bind(IssueStatus::Open.as_str())
    .bind(priority.as_str())
    .fetch_one(pool)
    .await?;
    let issue = issue_from_row(&row)?;
    info!(issue_id = %issue.id, business_id = %issue.business_id, priority = %issue.priority, "issue opened");
    Ok(issue)
}

pub async fn update_issue(pool: &PgPool, user: &User, id: Uuid, patch: IssuePatch) -> Result<Issue, CatalogError> {
    let before = get_issue(pool, user, id).await?;
    let title = patch.title.as_deref().map(|v| require_text("title", v)).transpose()?;
    let description = patch
        .description
        .as_deref()
        .map(|v| require_text("description", v))
        .transpose()?;

    let row = sqlx::query(&format!(
        "UPDATE issues SET
             title = COALESCE($2, title),
             description = COALESCE($3, description),
             status = COALESCE($4, status),
             priority = COALESCE($5, priority),
             technician_id = COALESCE($6, technician_id),
             problem_id = COALESCE($7, problem_id),
             updated_at = now()
         WHERE id = $1
         RETURNING {ISSUE_COLUMNS}"
    ))
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(patch.status.map(IssueStatus::as_str))
    .bind(patch.priority.map(IssuePriority::as_str))
    .bind(patch.technician_id)
    .bind(patch.problem_id)
    .fetch_one(pool)
    .await?;
    let issue = issue_from_row(&row)?;
    if before.status != issue.status {
        info!(issue_id = %id, from = %before.status, to = %issue.status, "issue status changed");
    }
    Ok(issue)
}

pub async fn delete_issue(pool: &PgPool, user: &User, id: Uuid) -> Result<(), CatalogError> {
    get_issue(pool, user, id).await?;
    sqlx::query("DELETE FROM issues WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "issue_test.rs"]
mod tests;
