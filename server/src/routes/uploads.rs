//! Upload routes and signed serving of locally stored files.

use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use records::Upload;
use serde::Deserialize;
use tracing::warn;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::services::upload::{self, MAX_UPLOAD_BYTES, UploadError};
use crate::state::AppState;
use crate::storage::{LocalFiles, unix_now};

/// Request body cap for the upload route: the file limit plus room for
/// multipart framing and the `folder` field.
pub const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 64 * 1024;

#[derive(Debug, Deserialize)]
pub struct KeyQuery {
    pub key: String,
}

fn multipart_error(e: &axum::extract::multipart::MultipartError) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::TooLarge
    } else {
        UploadError::Malformed(e.body_text())
    }
}

/// Read a field chunk by chunk, failing as soon as it passes the limit.
async fn read_limited(mut field: Field<'_>) -> Result<Vec<u8>, UploadError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(&e))? {
        if bytes.len() + chunk.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// `POST /api/uploads`: multipart with a `file` field and optional `folder`.
pub async fn create_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Upload>), ApiError> {
    let mut file: Option<(Vec<u8>, String)> = None;
    let mut folder: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let content_type = field.content_type().unwrap_or_default().to_owned();
                // Reject before buffering anything.
                upload::extension_for(&content_type)?;
                file = Some((read_limited(field).await?, content_type));
            }
            Some("folder") => {
                folder = Some(field.text().await.map_err(|e| multipart_error(&e))?);
            }
            _ => {}
        }
    }

    let (bytes, content_type) = file.ok_or(UploadError::MissingFile)?;
    let stored = upload::store_upload(
        state.store.as_ref(),
        auth.user.id,
        bytes,
        &content_type,
        folder.as_deref(),
        state.url_ttl,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(stored)))
}

/// `GET /api/uploads/url?key=…`: fresh time-limited download URL. Only the
/// uploader may ask.
pub async fn download_url(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<KeyQuery>,
) -> Result<Json<Upload>, ApiError> {
    let upload = upload::download_url(state.store.as_ref(), auth.user.id, &query.key, state.url_ttl).await?;
    Ok(Json(upload))
}

/// `DELETE /api/uploads?key=…`: uploader only.
pub async fn delete_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<KeyQuery>,
) -> Result<StatusCode, ApiError> {
    upload::delete_upload(state.store.as_ref(), auth.user.id, &query.key).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// SIGNED FILE SERVING
// =============================================================================

#[derive(Debug, Deserialize)]
struct SignedQuery {
    expires: u64,
    sig: String,
}

/// Key addressed by a `/files/{key}` request path. Accepts the path with or
/// without the `/files` mount prefix.
pub(crate) fn file_key(path: &str) -> Option<&str> {
    path.strip_prefix("/files")
        .unwrap_or(path)
        .strip_prefix('/')
        .filter(|k| !k.is_empty())
}

/// Middleware in front of the `/files` static service: only requests with a
/// valid, unexpired signature reach the file.
pub async fn verify_signed(State(files): State<LocalFiles>, req: Request, next: Next) -> Response {
    let key = file_key(req.uri().path()).map(str::to_owned);
    let query = Query::<SignedQuery>::try_from_uri(req.uri()).ok();
    let allowed = match (key, query) {
        (Some(key), Some(Query(q))) => files.signer.verify(&key, q.expires, &q.sig, unix_now()),
        _ => false,
    };
    if !allowed {
        warn!(path = %req.uri().path(), "rejected unsigned or expired file request");
        return ApiError::forbidden("invalid or expired file link").into_response();
    }
    next.run(req).await
}

#[cfg(test)]
#[path = "uploads_test.rs"]
mod tests;
