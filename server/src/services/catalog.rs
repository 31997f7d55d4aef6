//! Businesses, employees, and equipment.
//!
//! ACCESS
//! ======
//! A user can see a business they own, or one that lists them as an
//! employee (matched on email). Owners and managers may edit the business
//! and its roster; only the owner may delete it. Any member may manage the
//! business's equipment.

use axum::http::StatusCode;
use records::input::{BusinessPatch, EmployeePatch, EquipmentPatch, NewBusiness, NewEmployee, NewEquipment};
use records::{Business, Employee, EmployeeRole, Equipment, EquipmentStatus, User};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::db::parse_enum;
use crate::error::ErrorCode;

// =============================================================================
// ERROR
// =============================================================================

/// Error shared by the CRUD services (catalog, problems, issues, technicians).
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} not found: {1}")]
    NotFound(&'static str, Uuid),
    #[error("not allowed to {0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for CatalogError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(..) => "E_NOT_FOUND",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(..) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Trim `value` and reject it when empty.
pub(crate) fn require_text(field: &str, value: &str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_owned())
}

/// Trim optional text, mapping blank to `None`.
pub(crate) fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

// =============================================================================
// ACCESS
// =============================================================================

/// How the caller relates to a business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Owner,
    Employee(EmployeeRole),
}

impl Access {
    #[must_use]
    pub fn can_manage(self) -> bool {
        matches!(self, Self::Owner | Self::Employee(EmployeeRole::Owner | EmployeeRole::Manager))
    }
}

/// Resolve the caller's access to `business_id`.
///
/// # Errors
///
/// `NotFound` if the business does not exist, `Forbidden` if the caller is
/// neither owner nor employee.
pub async fn access(pool: &PgPool, user: &User, business_id: Uuid) -> Result<Access, CatalogError> {
    let owner: Option<Uuid> = sqlx::query_scalar("SELECT owner_id FROM businesses WHERE id = $1")
        .bind(business_id)
        .fetch_optional(pool)
        .await?;
    let Some(owner) = owner else {
        return Err(CatalogError::NotFound("business", business_id));
    };
    if owner == user.id {
        return Ok(Access::Owner);
    }

    let role: Option<String> = sqlx::query_scalar(
        "SELECT role FROM employees WHERE business_id = $1 AND lower(email) = lower($2) LIMIT 1",
    )
    .bind(business_id)
    .bind(&user.email)
    .fetch_optional(pool)
    .await?;
    match role {
        Some(raw) => Ok(Access::Employee(parse_enum(&raw)?)),
        None => Err(CatalogError::Forbidden("access this business")),
    }
}

async fn require_manager(pool: &PgPool, user: &User, business_id: Uuid) -> Result<(), CatalogError> {
    if access(pool, user, business_id).await?.can_manage() {
        Ok(())
    } else {
        Err(CatalogError::Forbidden("manage this business"))
    }
}

/// Ids of every business the caller can see.
pub async fn member_business_ids(pool: &PgPool, user: &User) -> Result<Vec<Uuid>, CatalogError> {
    let ids = sqlx::query_scalar(
        r"SELECT b.id FROM businesses b
          WHERE b.owner_id = $1
             OR EXISTS (
                 SELECT 1 FROM employees e
                 WHERE e.business_id = b.id AND lower(e.email) = lower($2)
             )",
    )
    .bind(user.id)
    .bind(&user.email)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

// =============================================================================
// BUSINESSES
// =============================================================================

const BUSINESS_COLUMNS: &str =
    "id, name, address, phone, owner_id, (extract(epoch from created_at) * 1000)::bigint AS created_at";

fn business_from_row(row: &PgRow) -> Result<Business, sqlx::Error> {
    Ok(Business {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
        owner_id: row.try_get("owner_id")?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn list_businesses(pool: &PgPool, user: &User) -> Result<Vec<Business>, CatalogError> {
    let ids = member_business_ids(pool, user).await?;
    let rows = sqlx::query(&format!(
        "SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ANY($1) ORDER BY name"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(business_from_row).collect::<Result<_, _>>()?)
}

pub async fn get_business(pool: &PgPool, user: &User, id: Uuid) -> Result<Business, CatalogError> {
    access(pool, user, id).await?;
    let row = sqlx::query(&format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(CatalogError::NotFound("business", id))?;
    Ok(business_from_row(&row)?)
}

pub async fn create_business(pool: &PgPool, user: &User, input: NewBusiness) -> Result<Business, CatalogError> {
    let name = require_text("name", &input.name)?;
    let row = sqlx::query(&format!(
        "INSERT INTO businesses (id, name, address, phone, owner_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {BUSINESS_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(optional_text(input.address.as_deref()))
    .bind(optional_text(input.phone.as_deref()))
    .bind(user.id)
    .fetch_one(pool)
    .await?;
    let business = business_from_row(&row)?;
    info!(business_id = %business.id, owner_id = %user.id, "business created");
    Ok(business)
}

pub async fn update_business(
    pool: &PgPool,
    user: &User,
    id: Uuid,
    patch: BusinessPatch,
) -> Result<Business, CatalogError> {
    require_manager(pool, user, id).await?;
    let name = patch.name.as_deref().map(|n| require_text("name", n)).transpose()?;
    let row = sqlx::query(&format!(
        "UPDATE businesses SET
             name = COALESCE($2, name),
             address = COALESCE($3, address),
             phone = COALESCE($4, phone)
         WHERE id = $1
         RETURNING {BUSINESS_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(optional_text(patch.address.as_deref()))
    .bind(optional_text(patch.phone.as_deref()))
    .fetch_optional(pool)
    .await?
    .ok_or(CatalogError::NotFound("business", id))?;
    Ok(business_from_row(&row)?)
}

pub async fn delete_business(pool: &PgPool, user: &User, id: Uuid) -> Result<(), CatalogError> {
    if access(pool, user, id).await? != Access::Owner {
        return Err(CatalogError::Forbidden("delete this business"));
    }
    sqlx::query("DELETE FROM businesses WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    info!(business_id = %id, "business deleted");
    Ok(())
}

// =============================================================================
// EMPLOYEES
// =============================================================================

const EMPLOYEE_COLUMNS: &str =
    "id, business_id, name, email, role, (extract(epoch from created_at) * 1000)::bigint AS created_at";

fn employee_from_row(row: &PgRow) -> Result<Employee, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(Employee {
        id: row.try_get("id")?,
        business_id: row.try_get("business_id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: parse_enum(&role)?,
        created_at: row.try_get("created_at")?,
    })
}

pub async fn list_employees(pool: &PgPool, user: &User, business_id: Uuid) -> Result<Vec<Employee>, CatalogError> {
    access(pool, user, business_id).await?;
    let rows = sqlx::query(&format!(
        "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE business_id = $1 ORDER BY name"
    ))
    .bind(business_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(employee_from_row).collect::<Result<_, _>>()?)
}

pub async fn add_employee(
    pool: &PgPool,
    user: &User,
    business_id: Uuid,
    input: NewEmployee,
) -> Result<Employee, CatalogError> {
    require_manager(pool, user, business_id).await?;
    let name = require_text("name", &input.name)?;
    let row = sqlx::query(&format!(
        "INSERT INTO employees (id, business_id, name, email, role)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {EMPLOYEE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(business_id)
    .bind(name)
    .bind(optional_text(input.email.as_deref()).map(|e| e.to_ascii_lowercase()))
    .bind(input.role.as_str())
    .fetch_one(pool)
    .await?;
    Ok(employee_from_row(&row)?)
}

async fn employee_business(pool: &PgPool, employee_id: Uuid) -> Result<Uuid, CatalogError> {
    sqlx::query_scalar("SELECT business_id FROM employees WHERE id = $1")
        .bind(employee_id)
        .fetch_optional(pool)
        .await?
        .ok_or(CatalogError::NotFound("employee", employee_id))
}

pub async fn update_employee(
    pool: &PgPool,
    user: &User,
    employee_id: Uuid,
    patch: EmployeePatch,
) -> Result<Employee, CatalogError> {
    let business_id = employee_business(pool, employee_id).await?;
    require_manager(pool, user, business_id).await?;
    let name = patch.name.as_deref().map(|n| require_text("name", n)).transpose()?;
    let row = sqlx::query(&format!(
        "UPDATE employees SET
             name = COALESCE($2, name),
             email = COALESCE($3, email),
             role = COALESCE($4, role)
         WHERE id = $1
         RETURNING {EMPLOYEE_COLUMNS}"
    ))
    .bind(employee_id)
    .bind(name)
    .bind(optional_text(patch.email.as_deref()).map(|e| e.to_ascii_lowercase()))
    .bind(patch.role.map(EmployeeRole::as_str))
    .fetch_one(pool)
    .await?;
    Ok(employee_from_row(&row)?)
}

pub async fn delete_employee(pool: &PgPool, user: &User, employee_id: Uuid) -> Result<(), CatalogError> {
    let business_id = employee_business(pool, employee_id).await?;
    require_manager(pool, user, business_id).await?;
    sqlx::query("DELETE FROM employees WHERE id = $1")
        .bind(employee_id)
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// EQUIPMENT
// =============================================================================

const EQUIPMENT_COLUMNS: &str = "id, business_id, name, manufacturer, model, category, serial_number, location, \
     status, purchase_date, notes, (extract(epoch from created_at) * 1000)::bigint AS created_at";

pub(crate) fn equipment_from_row(row: &PgRow) -> Result<Equipment, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Equipment {
        id: row.try_get("id")?,
        business_id: row.try_get("business_id")?,
        name: row.try_get("name")?,
        manufacturer: row.try_get("manufacturer")?,
        model: row.try_get("model")?,
        category: row.try_get("category")?,
        serial_number: row.try_get("serial_number")?,
        location: row.try_get("location")?,
        status: parse_enum(&status)?,
        purchase_date: row.try_get("purchase_date")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Equipment across every business the caller can see, optionally narrowed
/// to one business.
pub async fn list_equipment(
    pool: &PgPool,
    user: &User,
    business_id: Option<Uuid>,
) -> Result<Vec<Equipment>, CatalogError> {
    let ids = match business_id {
        Some(id) => {
            access(pool, user, id).await?;
            vec![id]
        }
        None => member_business_ids(pool, user).await?,
    };
    let rows = sqlx::query(&format!(
        "SELECT {EQUIPMENT_COLUMNS} FROM equipment WHERE business_id = ANY($1) ORDER BY name"
    ))
    .bind(&ids)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(equipment_from_row).collect::<Result<_, _>>()?)
}

/// Load one machine without an access check. Callers check access on the
/// returned `business_id`.
pub(crate) async fn load_equipment(pool: &PgPool, id: Uuid) -> Result<Equipment, CatalogError> {
    let row = sqlx::query(&format!("SELECT {EQUIPMENT_COLUMNS} FROM equipment WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(CatalogError::NotFound("equipment", id))?;
    Ok(equipment_from_row(&row)?)
}

pub async fn get_equipment(pool: &PgPool, user: &User, id: Uuid) -> Result<Equipment, CatalogError> {
    let equipment = load_equipment(pool, id).await?;
    access(pool, user, equipment.business_id).await?;
    Ok(equipment)
}

pub async fn create_equipment(pool: &PgPool, user: &User, input: NewEquipment) -> Result<Equipment, CatalogError> {
    access(pool, user, input.business_id).await?;
    let name = require_text("name", &input.name)?;
    let manufacturer = require_text("manufacturer", &input.manufacturer)?;
    let model = require_text("model", &input.model)?;
    let category = require_text("category", &input.category)?.to_lowercase();
    let status = input.status.unwrap_or(EquipmentStatus::Operational);

    let row = sqlx::query(&format!(
        "INSERT INTO equipment
             (id, business_id, name, manufacturer, model, category, serial_number, location, status, purchase_date, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         RETURNING {EQUIPMENT_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(input.business_id)
    .bind(name)
    .bind(manufacturer)
    .bind(model)
    .bind(category)
    .bind(optional_text(input.serial_number.as_deref()))
    .bind(optional_text(input.location.as_deref()))
    .bind(status.as_str())
    .bind(optional_text(input.purchase_date.as_deref()))
    .bind(optional_text(input.notes.as_deref()))
    .fetch_one(pool)
    .await?;
    let equipment = equipment_from_row(&row)?;
    info!(equipment_id = %equipment.id, business_id = %equipment.business_id, "equipment created");
    Ok(equipment)
}

pub async fn update_equipment(
    pool: &PgPool,
    user: &User,
    id: Uuid,
    patch: EquipmentPatch,
) -> Result<Equipment, CatalogError> {
    get_equipment(pool, user, id).await?;
    let name = patch.name.as_deref().map(|v| require_text("name", v)).transpose()?;
    let manufacturer = patch
        .manufacturer
        .as_deref()
        .map(|v| require_text("manufacturer", v))
        .transpose()?;
    let model = patch.model.as_deref().map(|v| require_text("model", v)).transpose()?;
    let category = patch
        .category
        .as_deref()
        .map(|v| require_text("category", v).map(|c| c.to_lowercase()))
        .transpose()?;

    let row = sqlx::query(&format!(
        "UPDATE equipment SET
             name = COALESCE($2, name),
             manufacturer = COALESCE($3, manufacturer),
             model = COALESCE($4, model),
             category = COALESCE($5, category),
             serial_number = COALESCE($6, serial_number),
             location = COALESCE($7, location),
             status = COALESCE($8, status),
             purchase_date = COALESCE($9, purchase_date),
             notes = COALESCE($10, notes)
         WHERE id = $1
         RETURNING {EQUIPMENT_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(manufacturer)
    .bind(model)
    .bind(category)
    .bind(optional_text(patch.serial_number.as_deref()))
    .bind(optional_text(patch.location.as_deref()))
    .bind(patch.status.map(EquipmentStatus::as_str))
    .bind(optional_text(patch.purchase_date.as_deref()))
    .bind(optional_text(patch.notes.as_deref()))
    .fetch_one(pool)
    .await?;
    Ok(equipment_from_row(&row)?)
}

pub async fn delete_equipment(pool: &PgPool, user: &User, id: Uuid) -> Result<(), CatalogError> {
    get_equipment(pool, user, id).await?;
    sqlx::query("DELETE FROM equipment WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    info!(equipment_id = %id, "equipment deleted");
    Ok(())
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
