//! Chat sessions and their message log.
//!
//! DESIGN
//! ======
//! A session belongs to exactly one user; every lookup is scoped by
//! `user_id`, so another user's session id reads as not found. Messages are
//! append-only and ordered by a database sequence rather than by timestamp,
//! since several can land within the same millisecond.

use axum::http::StatusCode;
use records::input::{NewMessage, SessionPatch};
use records::{Message, MessageKind, Session, SessionStatus};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::db::parse_enum;
use crate::error::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("chat session not found: {0}")]
    NotFound(Uuid),
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ChatError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_SESSION_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

const SESSION_COLUMNS: &str =
    "id, user_id, status, metadata, (extract(epoch from created_at) * 1000)::bigint AS created_at";
const MESSAGE_COLUMNS: &str =
    "id, session_id, content, kind, metadata, (extract(epoch from created_at) * 1000)::bigint AS created_at";

fn session_from_row(row: &PgRow) -> Result<Session, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Session {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        status: parse_enum(&status)?,
        metadata: row.try_get("metadata")?,
        created_at: row.try_get("created_at")?,
    })
}

fn message_from_row(row: &PgRow) -> Result<Message, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    Ok(Message {
        id: row.try_get("id")?,
        session_id: row.try_get("session_id")?,
        content: row.try_get("content")?,
        kind: parse_enum(&kind)?,
        created_at: row.try_get("created_at")?,
        metadata: row.try_get("metadata")?,
    })
}

/// Shallow-merge `patch` into `base`. A `null` value in the patch removes
/// the key.
///
/// # Errors
///
/// Returns `Validation` when `patch` is not a JSON object.
pub fn merge_metadata(base: &Value, patch: &Value) -> Result<Value, ChatError> {
    let Value::Object(changes) = patch else {
        return Err(ChatError::Validation("metadata must be a JSON object".into()));
    };
    let mut merged: Map<String, Value> = match base {
        Value::Object(existing) => existing.clone(),
        _ => Map::new(),
    };
    for (key, value) in changes {
        if value.is_null() {
            merged.remove(key);
        } else {
            merged.insert(key.clone(), value.clone());
        }
    }
    Ok(Value::Object(merged))
}

// =============================================================================
// SESSIONS
// =============================================================================

/// Create an active session with empty metadata.
///
/// # Errors
///
/// Returns a database error if the insert fails.
pub async fn create_session(pool: &PgPool, user_id: Uuid) -> Result<Session, ChatError> {
    let row = sqlx::query(&format!(
        "INSERT INTO chat_sessions (id, user_id, status, metadata)
         VALUES ($1, $2, $3, '{{}}'::jsonb)
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(SessionStatus::Active.as_str())
    .fetch_one(pool)
    .await?;
    let session = session_from_row(&row)?;
    info!(session_id = %session.id, %user_id, "chat session created");
    Ok(session)
}

/// # Errors
///
/// Returns `NotFound` if the session does not exist or belongs to someone
/// else.
pub async fn get_session(pool: &PgPool, user_id: Uuid, session_id: Uuid) -> Result<Session, ChatError> {
    let row = sqlx::query(&format!("SELECT {SESSION_COLUMNS} FROM chat_sessions WHERE id = $1 AND user_id = $2"))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(ChatError::NotFound(session_id))?;
    Ok(session_from_row(&row)?)
}

/// Apply a status change and/or metadata merge.
///
/// # Errors
///
/// Returns `NotFound` for a foreign or missing session and `Validation` for
/// non-object metadata.
pub async fn update_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Uuid,
    patch: SessionPatch,
) -> Result<Session, ChatError> {
    let current = get_session(pool, user_id, session_id).await?;
    let metadata = match &patch.metadata {
        Some(changes) => merge_metadata(&current.metadata, changes)?,
        None => current.metadata,
    };
    let status = patch.status.unwrap_or(current.status);

    let row = sqlx::query(&format!(
        "UPDATE chat_sessions SET status = $2, metadata = $3
         WHERE id = $1
         RETURNING {SESSION_COLUMNS}"
    ))
    .bind(session_id)
    .bind(status.as_str())
    .bind(&metadata)
    .fetch_one(pool)
    .await?;
    if status != current.status {
        info!(%session_id, from = %current.status, to = %status, "chat session status changed");
    }
    Ok(session_from_row(&row)?)
}

/// Merge server-maintained keys into a session's metadata without an
/// ownership check. Callers have already loaded the session.
pub(crate) async fn merge_session_metadata(pool: &PgPool, session_id: Uuid, changes: Value) -> Result<(), ChatError> {
    sqlx::query("UPDATE chat_sessions SET metadata = metadata || $2 WHERE id = $1")
        .bind(session_id)
        .bind(changes)
        .execute(pool)
        .await?;
    Ok(())
}

pub(crate) async fn set_status(pool: &PgPool, session_id: Uuid, status: SessionStatus) -> Result<(), ChatError> {
    sqlx::query("UPDATE chat_sessions SET status = $2 WHERE id = $1")
        .bind(session_id)
        .bind(status.as_str())
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// MESSAGES
// =============================================================================

pub(crate) async fn insert_message(
    pool: &PgPool,
    session_id: Uuid,
    kind: MessageKind,
    content: &str,
    metadata: Value,
) -> Result<Message, ChatError> {
    let row = sqlx::query(&format!(
        "INSERT INTO chat_messages (id, session_id, content, kind, metadata)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {MESSAGE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(session_id)
    .bind(content)
    .bind(kind.as_str())
    .bind(metadata)
    .fetch_one(pool)
    .await?;
    Ok(message_from_row(&row)?)
}

/// Append a message on behalf of the session owner. `kind` defaults to
/// `user`.
///
/// # Errors
///
/// Returns `Validation` for blank content and `NotFound` for a foreign or
/// missing session.
pub async fn append_message(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Uuid,
    input: NewMessage,
) -> Result<Message, ChatError> {
    let content = input.content.trim();
    if content.is_empty() {
        return Err(ChatError::Validation("message content must not be empty".into()));
    }
    get_session(pool, user_id, session_id).await?;
    insert_message(
        pool,
        session_id,
        input.kind.unwrap_or(MessageKind::User),
        content,
        Value::Object(Map::new()),
    )
    .await
}

/// Messages in insertion order.
///
/// # Errors
///
/// Returns `NotFound` for a foreign or missing session.
pub async fn list_messages(pool: &PgPool, user_id: Uuid, session_id: Uuid) -> Result<Vec<Message>, ChatError> {
    get_session(pool, user_id, session_id).await?;
    let rows = sqlx::query(&format!(
        "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = $1 ORDER BY seq"
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(message_from_row).collect::<Result<_, _>>()?)
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
