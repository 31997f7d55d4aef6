//! Known problems and the solutions recorded against them.
//!
//! Problems form a shared knowledge base: anyone signed in can read them,
//! which is what lets a fault seen at one restaurant help another. Tying a
//! problem to a specific machine requires access to that machine.

use std::collections::HashMap;

use records::input::{NewProblem, NewSolution, SolutionPatch};
use records::{Problem, ResolvedBy, Solution, User};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::catalog::{self, CatalogError, optional_text, require_text};
use crate::db::parse_enum;

const MAX_EFFECTIVENESS: f64 = 5.0;

/// Query filters for [`list_problems`].
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct ProblemFilter {
    pub equipment_id: Option<Uuid>,
    pub category: Option<String>,
}

const PROBLEM_COLUMNS: &str =
    "id, description, equipment_id, category, (extract(epoch from created_at) * 1000)::bigint AS created_at";
const SOLUTION_COLUMNS: &str = "id, problem_id, cause, treatment, cost, resolved_by, effectiveness, \
     (extract(epoch from created_at) * 1000)::bigint AS created_at";

fn problem_from_row(row: &PgRow) -> Result<Problem, sqlx::Error> {
    Ok(Problem {
        id: row.try_get("id")?,
        description: row.try_get("description")?,
        equipment_id: row.try_get("equipment_id")?,
        category: row.try_get("category")?,
        created_at: row.try_get("created_at")?,
        solutions: Vec::new(),
    })
}

fn solution_from_row(row: &PgRow) -> Result<Solution, sqlx::Error> {
    let resolved_by: String = row.try_get("resolved_by")?;
    Ok(Solution {
        id: row.try_get("id")?,
        problem_id: row.try_get("problem_id")?,
        cause: row.try_get("cause")?,
        treatment: row.try_get("treatment")?,
        cost: row.try_get("cost")?,
        resolved_by: parse_enum(&resolved_by)?,
        effectiveness: row.try_get("effectiveness")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Validate an effectiveness score.
pub(crate) fn check_effectiveness(value: f64) -> Result<f64, CatalogError> {
    if value.is_finite() && (0.0..=MAX_EFFECTIVENESS).contains(&value) {
        Ok(value)
    } else {
        Err(CatalogError::Validation(format!("effectiveness must be between 0 and {MAX_EFFECTIVENESS}")))
    }
}

fn check_cost(value: Option<f64>) -> Result<Option<f64>, CatalogError> {
    match value {
        Some(c) if !c.is_finite() || c < 0.0 => Err(CatalogError::Validation("cost must be non-negative".into())),
        other => Ok(other),
    }
}

/// Attach solutions to each problem, best first.
pub(crate) async fn with_solutions(pool: &PgPool, mut problems: Vec<Problem>) -> Result<Vec<Problem>, sqlx::Error> {
    if problems.is_empty() {
        return Ok(problems);
    }
    let ids: Vec<Uuid> = problems.iter().map(|p| p.id).collect();
    let rows = sqlx::query(&format!(
        "SELECT {SOLUTION_COLUMNS} FROM solutions
         WHERE problem_id = ANY($1)
         ORDER BY effectiveness DESC, created_at ASC"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut by_problem: HashMap<Uuid, Vec<Solution>> = HashMap::new();
    for row in &rows {
        let solution = solution_from_row(row)?;
        by_problem.entry(solution.problem_id).or_default().push(solution);
    }
    for problem in &mut problems {
        problem.solutions = by_problem.remove(&problem.id).unwrap_or_default();
    }
    Ok(problems)
}

// =============================================================================
// QUERIES FOR DIAGNOSIS
// =============================================================================

/// Every problem recorded against one machine, with solutions.
pub(crate) async fn problems_for_equipment(pool: &PgPool, equipment_id: Uuid) -> Result<Vec<Problem>, sqlx::Error> {
    let rows = sqlx::query(&format!("SELECT {PROBLEM_COLUMNS} FROM problems WHERE equipment_id = $1"))
        .bind(equipment_id)
        .fetch_all(pool)
        .await?;
    let problems = rows.iter().map(problem_from_row).collect::<Result<Vec<_>, _>>()?;
    with_solutions(pool, problems).await
}

/// Problems in `category` that are not tied to `exclude_equipment`, with
/// solutions. Matches either the problem's own category or that of the
/// machine it was recorded against.
pub(crate) async fn problems_in_category(
    pool: &PgPool,
    category: &str,
    exclude_equipment: Uuid,
) -> Result<Vec<Problem>, sqlx::Error> {
    let rows = sqlx::query(
        r"SELECT p.id, p.description, p.equipment_id, p.category,
                 (extract(epoch from p.created_at) * 1000)::bigint AS created_at
          FROM problems p
          LEFT JOIN equipment e ON e.id = p.equipment_id
          WHERE (lower(p.category) = lower($1) OR lower(e.category) = lower($1))
            AND p.equipment_id IS DISTINCT FROM $2",
    )
    .bind(category)
    .bind(exclude_equipment)
    .fetch_all(pool)
    .await?;
    let problems = rows.iter().map(problem_from_row).collect::<Result<Vec<_>, _>>()?;
    with_solutions(pool, problems).await
}

// =============================================================================
// PROBLEMS
// =============================================================================

pub async fn list_problems(pool: &PgPool, filter: ProblemFilter) -> Result<Vec<Problem>, CatalogError> {
    let category = optional_text(filter.category.as_deref());
    let rows = sqlx::query(&format!(
        "SELECT {PROBLEM_COLUMNS} FROM problems
         WHERE ($1::uuid IS NULL OR equipment_id = $1)
           AND ($2::text IS NULL OR lower(category) = lower($2))
         ORDER BY created_at DESC"
    ))
    .bind(filter.equipment_id)
    .bind(category)
    .fetch_all(pool)
    .await?;
    let problems = rows.iter().map(problem_from_row).collect::<Result<Vec<_>, _>>()?;
    Ok(with_solutions(pool, problems).await?)
}

pub async fn get_problem(pool: &PgPool, id: Uuid) -> Result<Problem, CatalogError> {
    let row = sqlx::query(&format!("SELECT {PROBLEM_COLUMNS} FROM problems WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(CatalogError::NotFound("problem", id))?;
    let problem = problem_from_row(&row)?;
    let mut loaded = with_solutions(pool, vec![problem]).await?;
    loaded.pop().ok_or(CatalogError::NotFound("problem", id))
}

pub async fn create_problem(pool: &PgPool, user: &User, input: NewProblem) -> Result<Problem, CatalogError> {
    let description = require_text("description", &input.description)?;
    let mut category = optional_text(input.category.as_deref()).map(|c| c.to_lowercase());
    if let Some(equipment_id) = input.equipment_id {
        let equipment = catalog::get_equipment(pool, user, equipment_id).await?;
        category.get_or_insert(equipment.category);
    }

    let row = sqlx::query(&format!(
        "INSERT INTO problems (id, description, equipment_id, category)
         VALUES ($1, $2, $3, $4)
         RETURNING {PROBLEM_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(description)
    .bind(input.equipment_id)
    .bind(category)
    .fetch_one(pool)
    .await?;
    let problem = problem_from_row(&row)?;
    info!(problem_id = %problem.id, equipment_id = ?problem.equipment_id, "problem recorded");
    Ok(problem)
}

/// Changing a problem tied to a machine, or any of its solutions, requires
/// access to that machine. Unattached problems are open to everyone.
async fn ensure_problem_access(pool: &PgPool, user: &User, problem: &Problem) -> Result<(), CatalogError> {
    if let Some(equipment_id) = problem.equipment_id {
        catalog::get_equipment(pool, user, equipment_id).await?;
    }
    Ok(())
}

/// Parent problem of a solution.
async fn problem_of_solution(pool: &PgPool, solution_id: Uuid) -> Result<Problem, CatalogError> {
    let problem_id: Uuid = sqlx::query_scalar("SELECT problem_id FROM solutions WHERE id = $1")
        .bind(solution_id)
        .fetch_optional(pool)
        .await?
        .ok_or(CatalogError::NotFound("solution", solution_id))?;
    get_problem(pool, problem_id).await
}

pub async fn delete_problem(pool: &PgPool, user: &User, id: Uuid) -> Result<(), CatalogError> {
    let problem = get_problem(pool, id).await?;
    ensure_problem_access(pool, user, &problem).await?;
    sqlx::query("DELETE FROM problems WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// SOLUTIONS
// =============================================================================

pub async fn list_solutions(pool: &PgPool, problem_id: Uuid) -> Result<Vec<Solution>, CatalogError> {
    Ok(get_problem(pool, problem_id).await?.solutions)
}

pub async fn add_solution(
    pool: &PgPool,
    user: &User,
    problem_id: Uuid,
    input: NewSolution,
) -> Result<Solution, CatalogError> {
    let problem = get_problem(pool, problem_id).await?;
    ensure_problem_access(pool, user, &problem).await?;
    let cause = require_text("cause", &input.cause)?;
    let treatment = require_text("treatment", &input.treatment)?;
    let effectiveness = check_effectiveness(input.effectiveness.unwrap_or(0.0))?;
    let cost = check_cost(input.cost)?;

    let row = sqlx::query(&format!(
        "INSERT INTO solutions (id, problem_id, cause, treatment, cost, resolved_by, effectiveness)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING {SOLUTION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(problem_id)
    .bind(cause)
    .bind(treatment)
    .bind(cost)
    .bind(input.resolved_by.as_str())
    .bind(effectiveness)
    .fetch_one(pool)
    .await?;
    let solution = solution_from_row(&row)?;
    info!(solution_id = %solution.id, %problem_id, "solution recorded");
    Ok(solution)
}

/// Record a solution produced by the AI diagnosis step.
pub(crate) async fn record_ai_solution(
    pool: &PgPool,
    description: &str,
    equipment_id: Option<Uuid>,
    category: Option<&str>,
    cause: &str,
    treatment: &str,
) -> Result<Uuid, sqlx::Error> {
    let problem_id = Uuid::new_v4();
    sqlx::query("INSERT INTO problems (id, description, equipment_id, category) VALUES ($1, $2, $3, $4)")
        .bind(problem_id)
        .bind(description)
        .bind(equipment_id)
        .bind(category)
        .execute(pool)
        .await?;
    sqlx::query(
        "INSERT INTO solutions (id, problem_id, cause, treatment, resolved_by) VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(problem_id)
    .bind(cause)
    .bind(treatment)
    .bind(ResolvedBy::Ai.as_str())
    .execute(pool)
    .await?;
    Ok(problem_id)
}

pub async fn update_solution(
    pool: &PgPool,
    user: &User,
    id: Uuid,
    patch: SolutionPatch,
) -> Result<Solution, CatalogError> {
    let problem = problem_of_solution(pool, id).await?;
    ensure_problem_access(pool, user, &problem).await?;
    let cause = patch.cause.as_deref().map(|v| require_text("cause", v)).transpose()?;
    let treatment = patch
        .treatment
        .as_deref()
        .map(|v| require_text("treatment", v))
        .transpose()?;
    let effectiveness = patch.effectiveness.map(check_effectiveness).transpose()?;
    let cost = check_cost(patch.cost)?;

    let row = sqlx::query(&format!(
        "UPDATE solutions SET
             cause = COALESCE($2, cause),
             treatment = COALESCE($3, treatment),
             cost = COALESCE($4, cost),
             effectiveness = COALESCE($5, effectiveness)
         WHERE id = $1
         RETURNING {SOLUTION_COLUMNS}"
    ))
    .bind(id)
    .bind(cause)
    .bind(treatment)
    .bind(cost)
    .bind(effectiveness)
    .fetch_optional(pool)
    .await?
    .ok_or(CatalogError::NotFound("solution", id))?;
    Ok(solution_from_row(&row)?)
}

pub async fn delete_solution(pool: &PgPool, user: &User, id: Uuid) -> Result<(), CatalogError> {
    let problem = problem_of_solution(pool, id).await?;
    ensure_problem_access(pool, user, &problem).await?;
    let result = sqlx::query("DELETE FROM solutions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::NotFound("solution", id));
    }
    Ok(())
}

#[cfg(test)]
#[path = "problem_test.rs"]
mod tests;
