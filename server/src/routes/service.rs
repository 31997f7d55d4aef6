//! Problem, solution, issue, and technician routes.
//!
//! Problems, solutions and technicians form a shared directory open to any
//! signed-in user. Solutions on a problem tied to a machine can only be
//! changed by someone with access to that machine. Issues are scoped to the
//! caller's businesses.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use records::input::{IssuePatch, NewIssue, NewProblem, NewReview, NewSolution, NewTechnician, SolutionPatch, TechnicianPatch};
use records::{Issue, Problem, Solution, Technician, TechnicianReview};
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::{ApiError, ApiJson};
use crate::services::issue::{self, IssueFilter};
use crate::services::problem::{self, ProblemFilter};
use crate::services::technician::{self, TechnicianFilter};
use crate::state::AppState;

// =============================================================================
// PROBLEMS & SOLUTIONS
// =============================================================================

pub async fn list_problems(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(filter): Query<ProblemFilter>,
) -> Result<Json<Vec<Problem>>, ApiError> {
    Ok(Json(problem::list_problems(&state.pool, filter).await?))
}

pub async fn create_problem(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewProblem>,
) -> Result<(StatusCode, Json<Problem>), ApiError> {
    let created = problem::create_problem(&state.pool, &auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_problem(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Problem>, ApiError> {
    Ok(Json(problem::get_problem(&state.pool, id).await?))
}

pub async fn delete_problem(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    problem::delete_problem(&state.pool, &auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_solutions(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(problem_id): Path<Uuid>,
) -> Result<Json<Vec<Solution>>, ApiError> {
    Ok(Json(problem::list_solutions(&state.pool, problem_id).await?))
}

pub async fn add_solution(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(problem_id): Path<Uuid>,
    ApiJson(body): ApiJson<NewSolution>,
) -> Result<(StatusCode, Json<Solution>), ApiError> {
    let solution = problem::add_solution(&state.pool, &auth.user, problem_id, body).await?;
    Ok((StatusCode::CREATED, Json(solution)))
}

pub async fn update_solution(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<SolutionPatch>,
) -> Result<Json<Solution>, ApiError> {
    Ok(Json(problem::update_solution(&state.pool, &auth.user, id, patch).await?))
}

pub async fn delete_solution(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    problem::delete_solution(&state.pool, &auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ISSUES
// =============================================================================

pub async fn list_issues(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(filter): Query<IssueFilter>,
) -> Result<Json<Vec<Issue>>, ApiError> {
    Ok(Json(issue::list_issues(&state.pool, &auth.user, filter).await?))
}

pub async fn create_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewIssue>,
) -> Result<(StatusCode, Json<Issue>), ApiError> {
    let created = issue::create_issue(&state.pool, &auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Issue>, ApiError> {
    Ok(Json(issue::get_issue(&state.pool, &auth.user, id).await?))
}

pub async fn update_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<IssuePatch>,
) -> Result<Json<Issue>, ApiError> {
    Ok(Json(issue::update_issue(&state.pool, &auth.user, id, patch).await?))
}

pub async fn delete_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    issue::delete_issue(&state.pool, &auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// TECHNICIANS
// =============================================================================

pub async fn list_technicians(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(filter): Query<TechnicianFilter>,
) -> Result<Json<Vec<Technician>>, ApiError> {
    Ok(Json(technician::list_technicians(&state.pool, filter).await?))
}

pub async fn create_technician(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(body): ApiJson<NewTechnician>,
) -> Result<(StatusCode, Json<Technician>), ApiError> {
    let created = technician::create_technician(&state.pool, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn get_technician(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Technician>, ApiError> {
    Ok(Json(technician::get_technician(&state.pool, id).await?))
}

pub async fn update_technician(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<TechnicianPatch>,
) -> Result<Json<Technician>, ApiError> {
    Ok(Json(technician::update_technician(&state.pool, id, patch).await?))
}

pub async fn delete_technician(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    technician::delete_technician(&state.pool, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_reviews(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TechnicianReview>>, ApiError> {
    Ok(Json(technician::list_reviews(&state.pool, id).await?))
}

pub async fn add_review(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(body): ApiJson<NewReview>,
) -> Result<(StatusCode, Json<TechnicianReview>), ApiError> {
    let review = technician::add_review(&state.pool, id, body).await?;
    Ok((StatusCode::CREATED, Json(review)))
}
