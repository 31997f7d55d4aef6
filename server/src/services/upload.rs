//! Upload validation and object key allocation.
//!
//! Routes hand over the raw multipart pieces; this module decides whether the
//! file is acceptable, picks its key, and stores it.
//!
//! Keys are `{folder}/{uploader_id}/{uuid}.{ext}`. The segment before the
//! file name names the uploader, and only that user may mint new download
//! URLs for the object or delete it.

use std::time::Duration;

use axum::http::StatusCode;
use records::Upload;
use tracing::info;
use uuid::Uuid;

use crate::error::ErrorCode;
use crate::storage::{ObjectStore, StorageError, validate_key};

pub use records::MAX_UPLOAD_BYTES;

pub const DEFAULT_FOLDER: &str = "uploads";

/// Accepted MIME types and the file extension each is stored under.
pub const ALLOWED_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
    ("application/pdf", "pdf"),
    ("video/mp4", "mp4"),
];

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("missing file field")]
    MissingFile,
    #[error("file is empty")]
    Empty,
    #[error("file exceeds {MAX_UPLOAD_BYTES} bytes")]
    TooLarge,
    #[error("unsupported content type: {0}")]
    UnsupportedType(String),
    #[error("invalid folder: {0}")]
    InvalidFolder(String),
    #[error("malformed upload: {0}")]
    Malformed(String),
    #[error("not the uploader of {0}")]
    NotOwner(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ErrorCode for UploadError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::MissingFile => "E_MISSING_FILE",
            Self::Empty => "E_EMPTY_FILE",
            Self::TooLarge => "E_FILE_TOO_LARGE",
            Self::UnsupportedType(_) => "E_UNSUPPORTED_TYPE",
            Self::InvalidFolder(_) => "E_INVALID_FOLDER",
            Self::Malformed(_) => "E_MALFORMED_UPLOAD",
            Self::NotOwner(_) => "E_FORBIDDEN",
            Self::Storage(e) => e.error_code(),
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::MissingFile | Self::Empty | Self::InvalidFolder(_) | Self::Malformed(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::NotOwner(_) => StatusCode::FORBIDDEN,
            Self::Storage(e) => e.status(),
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.retryable())
    }
}

/// Extension for an allowed content type. Parameters such as `; charset=`
/// are ignored and matching is case-insensitive.
pub fn extension_for(content_type: &str) -> Result<&'static str, UploadError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .map(|(_, ext)| *ext)
        .ok_or_else(|| UploadError::UnsupportedType(content_type.to_owned()))
}

/// Normalize the optional `folder` field. Segments may contain ASCII
/// alphanumerics, `-` and `_` only.
pub fn normalize_folder(folder: Option<&str>) -> Result<String, UploadError> {
    let Some(raw) = folder.map(|f| f.trim().trim_matches('/')).filter(|f| !f.is_empty()) else {
        return Ok(DEFAULT_FOLDER.to_owned());
    };
    let ok = raw.split('/').all(|seg| {
        !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    });
    if !ok {
        return Err(UploadError::InvalidFolder(raw.to_owned()));
    }
    Ok(raw.to_owned())
}

#[must_use]
pub fn object_key(folder: &str, owner: Uuid, ext: &str) -> String {
    format!("{folder}/{owner}/{}.{ext}", Uuid::new_v4())
}

/// Uploader recorded in `key`, if it has one.
#[must_use]
pub fn key_owner(key: &str) -> Option<Uuid> {
    key.rsplit('/').nth(1)?.parse().ok()
}

fn ensure_owner(key: &str, user_id: Uuid) -> Result<(), UploadError> {
    if key_owner(key) == Some(user_id) {
        Ok(())
    } else {
        Err(UploadError::NotOwner(key.to_owned()))
    }
}

/// Validate and store one file, returning its key and a download URL.
pub async fn store_upload(
    store: &dyn ObjectStore,
    owner: Uuid,
    bytes: Vec<u8>,
    content_type: &str,
    folder: Option<&str>,
    url_ttl: Duration,
) -> Result<Upload, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(UploadError::TooLarge);
    }
    let ext = extension_for(content_type)?;
    let folder = normalize_folder(folder)?;
    let key = object_key(&folder, owner, ext);
    validate_key(&key)?;

    let size = bytes.len();
    let canonical_type = ALLOWED_TYPES
        .iter()
        .find(|(_, e)| *e == ext)
        .map_or(content_type, |(mime, _)| *mime);
    store.put(&key, bytes, canonical_type).await?;
    let url = store.download_url(&key, url_ttl)?;
    info!(%key, %owner, size, content_type = canonical_type, "upload stored");
    Ok(Upload { key, url })
}

/// A fresh download URL for an object `user_id` uploaded.
pub async fn download_url(
    store: &dyn ObjectStore,
    user_id: Uuid,
    key: &str,
    url_ttl: Duration,
) -> Result<Upload, UploadError> {
    validate_key(key)?;
    ensure_owner(key, user_id)?;
    if !store.exists(key).await? {
        return Err(StorageError::NotFound(key.to_owned()).into());
    }
    let url = store.download_url(key, url_ttl)?;
    Ok(Upload { key: key.to_owned(), url })
}

pub async fn delete_upload(store: &dyn ObjectStore, user_id: Uuid, key: &str) -> Result<(), UploadError> {
    validate_key(key)?;
    ensure_owner(key, user_id)?;
    store.delete(key).await?;
    info!(%key, %user_id, "upload deleted");
    Ok(())
}

#[cfg(test)]
#[path = "upload_test.rs"]
mod tests;
