//! Business, employee, and equipment routes.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use records::input::{BusinessPatch, EmployeePatch, EquipmentPatch, NewBusiness, NewEmployee, NewEquipment};
use records::{Business, Employee, Equipment};
use serde::Deserialize;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::error::{ApiError, ApiJson};
use crate::services::catalog;
use crate::state::AppState;

// =============================================================================
// BUSINESSES
// =============================================================================

pub async fn list_businesses(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<Business>>, ApiError> {
    Ok(Json(catalog::list_businesses(&state.pool, &auth.user).await?))
}

pub async fn create_business(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewBusiness>,
) -> Result<(StatusCode, Json<Business>), ApiError> {
    let business = catalog::create_business(&state.pool, &auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(business)))
}

pub async fn get_business(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Business>, ApiError> {
    Ok(Json(catalog::get_business(&state.pool, &auth.user, id).await?))
}

pub async fn update_business(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<BusinessPatch>,
) -> Result<Json<Business>, ApiError> {
    Ok(Json(catalog::update_business(&state.pool, &auth.user, id, patch).await?))
}

pub async fn delete_business(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    catalog::delete_business(&state.pool, &auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// EMPLOYEES
// =============================================================================

pub async fn list_employees(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(business_id): Path<Uuid>,
) -> Result<Json<Vec<Employee>>, ApiError> {
    Ok(Json(catalog::list_employees(&state.pool, &auth.user, business_id).await?))
}

pub async fn add_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(business_id): Path<Uuid>,
    ApiJson(body): ApiJson<NewEmployee>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    let employee = catalog::add_employee(&state.pool, &auth.user, business_id, body).await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn update_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<EmployeePatch>,
) -> Result<Json<Employee>, ApiError> {
    Ok(Json(catalog::update_employee(&state.pool, &auth.user, id, patch).await?))
}

pub async fn delete_employee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    catalog::delete_employee(&state.pool, &auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// EQUIPMENT
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct EquipmentQuery {
    pub business_id: Option<Uuid>,
}

pub async fn list_equipment(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<EquipmentQuery>,
) -> Result<Json<Vec<Equipment>>, ApiError> {
    Ok(Json(catalog::list_equipment(&state.pool, &auth.user, query.business_id).await?))
}

pub async fn create_equipment(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewEquipment>,
) -> Result<(StatusCode, Json<Equipment>), ApiError> {
    let equipment = catalog::create_equipment(&state.pool, &auth.user, body).await?;
    Ok((StatusCode::CREATED, Json(equipment)))
}

pub async fn get_equipment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Equipment>, ApiError> {
    Ok(Json(catalog::get_equipment(&state.pool, &auth.user, id).await?))
}

pub async fn update_equipment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<EquipmentPatch>,
) -> Result<Json<Equipment>, ApiError> {
    Ok(Json(catalog::update_equipment(&state.pool, &auth.user, id, patch).await?))
}

pub async fn delete_equipment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    catalog::delete_equipment(&state.pool, &auth.user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
