//! Email access-code auth service.
//!
//! Creates and verifies short-lived six-character codes linked to an email.
//! Codes are stored as SHA-256 hashes, expire after 10 minutes, and are
//! burned after five wrong guesses.

use axum::http::StatusCode;
use rand::Rng;
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::config::env_string;
use crate::error::ErrorCode;
use crate::services::session::bytes_to_hex;

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_FAILED_ATTEMPTS: i32 = 5;
const EMAIL_SUBJECT: &str = "Your FixDesk sign-in code";

#[derive(Debug, thiserror::Error)]
pub enum EmailAuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("email delivery failed: {0}")]
    EmailDelivery(String),
}

impl ErrorCode for EmailAuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::InvalidCode => "E_INVALID_CODE",
            Self::VerificationFailed => "E_VERIFICATION_FAILED",
            Self::Db(_) => "E_DATABASE",
            Self::EmailDelivery(_) => "E_EMAIL_DELIVERY",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidEmail | Self::InvalidCode => StatusCode::BAD_REQUEST,
            Self::VerificationFailed => StatusCode::UNAUTHORIZED,
            Self::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::EmailDelivery(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::EmailDelivery(_))
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Resend credentials. Absent in development, where codes are logged instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailConfig {
    pub resend_api_key: String,
    pub from: String,
}

impl EmailConfig {
    /// `Some` only when both `RESEND_API_KEY` and `RESEND_FROM` are set.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Some(Self { resend_api_key: env_string("RESEND_API_KEY")?, from: env_string("RESEND_FROM")? })
    }
}

// =============================================================================
// CODES
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_ascii_uppercase();
    let valid = normalized.len() == CODE_LEN && normalized.bytes().all(|b| CODE_ALPHABET.contains(&b));
    valid.then_some(normalized)
}

#[must_use]
pub fn generate_access_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[must_use]
pub fn hash_access_code(code: &str) -> String {
    bytes_to_hex(&Sha256::digest(code.as_bytes()))
}

fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

/// Upsert the user and issue a fresh code, invalidating older unused ones.
pub async fn request_access_code(pool: &PgPool, email: &str) -> Result<(String, String), EmailAuthError> {
    let normalized = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;

    sqlx::query(
        r"INSERT INTO users (email, name)
          VALUES ($1, $2)
          ON CONFLICT (email) DO NOTHING",
    )
    .bind(&normalized)
    .bind(name_from_email(&normalized))
    .execute(pool)
    .await?;

    sqlx::query("DELETE FROM email_login_codes WHERE email = $1 AND consumed_at IS NULL")
        .bind(&normalized)
        .execute(pool)
        .await?;

    let code = generate_access_code();
    sqlx::query("INSERT INTO email_login_codes (id, email, code_hash) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(&normalized)
        .bind(hash_access_code(&code))
        .execute(pool)
        .await?;

    Ok((normalized, code))
}

/// Consume a matching code and return the user id. A wrong guess counts
/// against the newest outstanding code.
pub async fn verify_access_code(pool: &PgPool, email: &str, code: &str) -> Result<Uuid, EmailAuthError> {
    let normalized_email = normalize_email(email).ok_or(EmailAuthError::InvalidEmail)?;
    let normalized_code = normalize_code(code).ok_or(EmailAuthError::InvalidCode)?;

    let consumed = sqlx::query(
        r"UPDATE email_login_codes
          SET consumed_at = now()
          WHERE id = (
              SELECT id FROM email_login_codes
              WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
              ORDER BY created_at DESC
              LIMIT 1
          )
          AND code_hash = $2
          RETURNING id",
    )
    .bind(&normalized_email)
    .bind(hash_access_code(&normalized_code))
    .fetch_optional(pool)
    .await?;

    if consumed.is_none() {
        sqlx::query(
            r"UPDATE email_login_codes
              SET attempts = attempts + 1,
                  consumed_at = CASE WHEN attempts + 1 >= $2 THEN now() ELSE consumed_at END
              WHERE id = (
                  SELECT id FROM email_login_codes
                  WHERE email = $1 AND consumed_at IS NULL AND expires_at > now()
                  ORDER BY created_at DESC
                  LIMIT 1
              )",
        )
        .bind(&normalized_email)
        .bind(MAX_FAILED_ATTEMPTS)
        .execute(pool)
        .await?;
        return Err(EmailAuthError::VerificationFailed);
    }

    let row = sqlx::query("SELECT id FROM users WHERE email = $1")
        .bind(&normalized_email)
        .fetch_optional(pool)
        .await?
        .ok_or(EmailAuthError::VerificationFailed)?;
    Ok(row.get("id"))
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Send the code through Resend, or log it when email is not configured.
pub async fn deliver_access_code(config: Option<&EmailConfig>, to_email: &str, code: &str) -> Result<(), EmailAuthError> {
    let Some(config) = config else {
        tracing::info!(email = %to_email, %code, "email delivery not configured; access code logged");
        return Ok(());
    };

    let resend = Resend::new(config.resend_api_key.as_str());
    let html = render_access_code_email(to_email, code);
    let email = CreateEmailBaseOptions::new(config.from.as_str(), [to_email], EMAIL_SUBJECT).with_html(&html);
    resend
        .emails
        .send(email)
        .await
        .map_err(|e| EmailAuthError::EmailDelivery(e.to_string()))?;
    tracing::info!(email = %to_email, "access code sent");
    Ok(())
}

#[must_use]
pub fn render_access_code_email(email: &str, code: &str) -> String {
    format!(
        "<!doctype html><html><body style=\"font-family:sans-serif\">\
         <p>Use this code to sign in to FixDesk as {email}:</p>\
         <p style=\"font-size:28px;letter-spacing:6px\"><strong>{code}</strong></p>\
         <p>The code expires in 10 minutes.</p></body></html>"
    )
}

#[cfg(test)]
#[path = "email_auth_test.rs"]
mod tests;
