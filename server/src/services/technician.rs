//! Technician directory and reviews.
//!
//! `rating` is the running mean of review scores and is updated in the same
//! transaction as the review insert, under a row lock on the technician.

use records::input::{NewReview, NewTechnician, TechnicianPatch};
use records::{Technician, TechnicianReview};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::catalog::{CatalogError, optional_text, require_text};

pub const MIN_SCORE: i16 = 1;
pub const MAX_SCORE: i16 = 5;

/// Query filters for [`list_technicians`].
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TechnicianFilter {
    pub specialty: Option<String>,
}

const TECHNICIAN_COLUMNS: &str = "id, name, email, phone, specialties, rating, review_count, \
     (extract(epoch from created_at) * 1000)::bigint AS created_at";
const REVIEW_COLUMNS: &str =
    "id, technician_id, issue_id, score, comment, (extract(epoch from created_at) * 1000)::bigint AS created_at";

fn technician_from_row(row: &PgRow) -> Result<Technician, sqlx::Error> {
    Ok(Technician {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        specialties: row.try_get("specialties")?,
        rating: row.try_get("rating")?,
        review_count: row.try_get("review_count")?,
        created_at: row.try_get("created_at")?,
    })
}

fn review_from_row(row: &PgRow) -> Result<TechnicianReview, sqlx::Error> {
    Ok(TechnicianReview {
        id: row.try_get("id")?,
        technician_id: row.try_get("technician_id")?,
        issue_id: row.try_get("issue_id")?,
        score: row.try_get("score")?,
        comment: row.try_get("comment")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Fold one more score into a running mean.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fold_rating(rating: f64, count: i64, score: i16) -> f64 {
    if count <= 0 {
        return f64::from(score);
    }
    let total = rating * count as f64 + f64::from(score);
    total / (count + 1) as f64
}

/// Lower-case, trim, and de-duplicate specialties, keeping first-seen order.
fn normalize_specialties(raw: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for s in raw {
        let s = s.trim().to_lowercase();
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

pub async fn list_technicians(pool: &PgPool, filter: TechnicianFilter) -> Result<Vec<Technician>, CatalogError> {
    let specialty = optional_text(filter.specialty.as_deref()).map(|s| s.to_lowercase());
    let rows = sqlx::query(&format!(
        "SELECT {TECHNICIAN_COLUMNS} FROM technicians
         WHERE $1::text IS NULL OR $1 = ANY(specialties)
         ORDER BY rating DESC, review_count DESC, name"
    ))
    .bind(specialty)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(technician_from_row).collect::<Result<_, _>>()?)
}

pub async fn get_technician(pool: &PgPool, id: Uuid) -> Result<Technician, CatalogError> {
    let row = sqlx::query(&format!("SELECT {TECHNICIAN_COLUMNS} FROM technicians WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(CatalogError::NotFound("technician", id))?;
    Ok(technician_from_row(&row)?)
}

pub async fn create_technician(pool: &PgPool, input: NewTechnician) -> Result<Technician, CatalogError> {
    let name = require_text("name", &input.name)?;
    let row = sqlx::query(&format!(
        "INSERT INTO technicians (id, name, email, phone, specialties)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {TECHNICIAN_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(optional_text(input.email.as_deref()))
    .bind(optional_text(input.phone.as_deref()))
    .bind(normalize_specialties(&input.specialties))
    .fetch_one(pool)
    .await?;
    Ok(technician_from_row(&row)?)
}

pub async fn update_technician(pool: &PgPool, id: Uuid, patch: TechnicianPatch) -> Result<Technician, CatalogError> {
    let name = patch.name.as_deref().map(|v| require_text("name", v)).transpose()?;
    let row = sqlx::query(&format!(
        "UPDATE technicians SET
             name = COALESCE($2, name),
             email = COALESCE($3, email),
             phone = COALESCE($4, phone),
             specialties = COALESCE($5, specialties)
         WHERE id = $1
         RETURNING {TECHNICIAN_COLUMNS}"
    ))
    .bind(id)
    .bind(name)
    .bind(optional_text(patch.email.as_deref()))
    .bind(optional_text(patch.phone.as_deref()))
    .bind(patch.specialties.as_deref().map(normalize_specialties))
    .fetch_optional(pool)
    .await?
    .ok_or(CatalogError::NotFound("technician", id))?;
    Ok(technician_from_row(&row)?)
}

pub async fn delete_technician(pool: &PgPool, id: Uuid) -> Result<(), CatalogError> {
    let result = sqlx::query("DELETE FROM technicians WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(CatalogError::NotFound("technician", id));
    }
    Ok(())
}

// =============================================================================
// REVIEWS
// =============================================================================

pub async fn list_reviews(pool: &PgPool, technician_id: Uuid) -> Result<Vec<TechnicianReview>, CatalogError> {
    get_technician(pool, technician_id).await?;
    let rows = sqlx::query(&format!(
        "SELECT {REVIEW_COLUMNS} FROM technician_reviews WHERE technician_id = $1 ORDER BY created_at DESC"
    ))
    .bind(technician_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(review_from_row).collect::<Result<_, _>>()?)
}

/// Insert a review and fold its score into the technician's rating.
pub async fn add_review(pool: &PgPool, technician_id: Uuid, input: NewReview) -> Result<TechnicianReview, CatalogError> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&input.score) {
        return Err(CatalogError::Validation(format!("score must be between {MIN_SCORE} and {MAX_SCORE}")));
    }

    let mut tx = pool.begin().await?;
    let current: Option<(f64, i64)> =
        sqlx::query_as("SELECT rating, review_count FROM technicians WHERE id = $1 FOR UPDATE")
            .bind(technician_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some((rating, count)) = current else {
        return Err(CatalogError::NotFound("technician", technician_id));
    };

    let row = sqlx::query(&format!(
        "INSERT INTO technician_reviews (id, technician_id, issue_id, score, comment)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {REVIEW_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(technician_id)
    .bind(input.issue_id)
    .bind(input.score)
    .bind(optional_text(input.comment.as_deref()))
    .fetch_one(&mut *tx)
    .await?;
    let review = review_from_row(&row)?;

    let new_rating = fold_rating(rating, count, input.score);
    sqlx::query("UPDATE technicians SET rating = $2, review_count = review_count + 1 WHERE id = $1")
        .bind(technician_id)
        .bind(new_rating)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!(%technician_id, score = input.score, rating = new_rating, "technician reviewed");
    Ok(review)
}

#[cfg(test)]
#[path = "technician_test.rs"]
mod tests;
