//! Object storage for uploaded photos, manuals, and videos.
//!
//! DESIGN
//! ======
//! Routes talk to an [`ObjectStore`] trait object. Two backends exist:
//! the local filesystem (files served back under `/files`) and an
//! S3-compatible HTTP store addressed as `{endpoint}/{bucket}/{key}`.
//! Download URLs are time-limited: they carry an `expires` unix timestamp
//! and a `sig`, an HMAC-SHA256 over the key and expiry keyed by a server
//! secret.

pub mod local;
pub mod s3;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::http::StatusCode;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::{env_parse, env_string};
use crate::error::ErrorCode;
use crate::services::session::bytes_to_hex;

const DEFAULT_LOCAL_DIR: &str = "./uploads";
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";
const DEFAULT_URL_TTL_SECS: u64 = 3600;

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid object key: {0}")]
    InvalidKey(String),
    #[error("object not found: {0}")]
    NotFound(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("storage config error: {0}")]
    Config(String),
}

impl ErrorCode for StorageError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidKey(_) => "E_INVALID_KEY",
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Io(_) => "E_STORAGE_IO",
            Self::Backend(_) => "E_STORAGE_BACKEND",
            Self::Config(_) => "E_STORAGE_CONFIG",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidKey(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Backend(_) => StatusCode::BAD_GATEWAY,
            Self::Io(_) | Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Backend(_))
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Abstract object store. Keys are validated with [`validate_key`] by callers
/// and again by each backend.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    /// Remove the object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Whether an object exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// A download URL that stops working after `ttl`.
    fn download_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}

/// Reject keys that could escape the store root.
///
/// # Errors
///
/// Returns `InvalidKey` for empty keys, `..` segments, a leading `/`, or
/// backslashes.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..")
        || key.contains("..");
    if bad {
        return Err(StorageError::InvalidKey(key.to_owned()));
    }
    Ok(())
}

// =============================================================================
// SIGNED URLS
// =============================================================================

type HmacSha256 = Hmac<Sha256>;

/// Signs and checks the `expires`/`sig` query pair on download URLs.
#[derive(Clone)]
pub struct UrlSigner {
    secret: String,
}

impl UrlSigner {
    #[must_use]
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }

    fn mac(&self, key: &str, expires: u64) -> Option<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes()).ok()?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Some(mac)
    }

    #[must_use]
    pub fn sign(&self, key: &str, expires: u64) -> String {
        self.mac(key, expires)
            .map(|mac| bytes_to_hex(&mac.finalize().into_bytes()))
            .unwrap_or_default()
    }

    /// Query string (`expires=…&sig=…`) valid for `ttl` from now.
    #[must_use]
    pub fn query(&self, key: &str, ttl: Duration) -> String {
        let expires = unix_now().saturating_add(ttl.as_secs());
        format!("expires={expires}&sig={}", self.sign(key, expires))
    }

    /// The signature comparison runs in constant time.
    #[must_use]
    pub fn verify(&self, key: &str, expires: u64, sig: &str, now: u64) -> bool {
        let Some(sig) = hex_to_bytes(sig) else {
            return false;
        };
        expires >= now && self.mac(key, expires).is_some_and(|mac| mac.verify_slice(&sig).is_ok())
    }
}

fn hex_to_bytes(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}

#[must_use]
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

// =============================================================================
// CONFIG
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Local { dir: PathBuf },
    S3 { endpoint: String, bucket: String, token: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub public_base_url: String,
    pub url_ttl: Duration,
    pub url_secret: Option<String>,
}

impl StorageConfig {
    /// Read `STORAGE_*` variables. `STORAGE_BACKEND` defaults to `local`.
    ///
    /// # Errors
    ///
    /// Returns `Config` for an unknown backend or an S3 backend without
    /// endpoint and bucket.
    pub fn from_env() -> Result<Self, StorageError> {
        let backend = match env_string("STORAGE_BACKEND").as_deref().unwrap_or("local") {
            "local" => StorageBackend::Local {
                dir: PathBuf::from(env_string("STORAGE_LOCAL_DIR").unwrap_or_else(|| DEFAULT_LOCAL_DIR.into())),
            },
            "s3" => StorageBackend::S3 {
                endpoint: env_string("STORAGE_S3_ENDPOINT")
                    .ok_or_else(|| StorageError::Config("STORAGE_S3_ENDPOINT not set".into()))?,
                bucket: env_string("STORAGE_S3_BUCKET")
                    .ok_or_else(|| StorageError::Config("STORAGE_S3_BUCKET not set".into()))?,
                token: env_string("STORAGE_S3_TOKEN"),
            },
            other => return Err(StorageError::Config(format!("unknown STORAGE_BACKEND: {other}"))),
        };
        let public_base_url = env_string("STORAGE_PUBLIC_BASE_URL")
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.into())
            .trim_end_matches('/')
            .to_owned();
        Ok(Self {
            backend,
            public_base_url,
            url_ttl: Duration::from_secs(env_parse("STORAGE_URL_TTL_SECS", DEFAULT_URL_TTL_SECS)),
            url_secret: env_string("STORAGE_URL_SECRET"),
        })
    }
}

/// Local directory served under `/files`, with the signer that guards it.
#[derive(Clone)]
pub struct LocalFiles {
    pub root: PathBuf,
    pub signer: UrlSigner,
}

/// A built store plus, for the local backend, what the router needs to
/// serve files back.
pub struct Storage {
    pub store: Arc<dyn ObjectStore>,
    pub files: Option<LocalFiles>,
    pub url_ttl: Duration,
}

impl Storage {
    /// Build the configured backend. A random URL secret is generated when
    /// `STORAGE_URL_SECRET` is unset, so URLs do not survive a restart.
    ///
    /// # Errors
    ///
    /// Returns an error if the S3 HTTP client cannot be built.
    pub fn from_config(config: StorageConfig) -> Result<Self, StorageError> {
        let signer = UrlSigner::new(
            config
                .url_secret
                .unwrap_or_else(crate::services::session::generate_token),
        );
        match config.backend {
            StorageBackend::Local { dir } => {
                let store = local::LocalStore::new(dir.clone(), config.public_base_url, signer.clone());
                Ok(Self {
                    store: Arc::new(store),
                    files: Some(LocalFiles { root: dir, signer }),
                    url_ttl: config.url_ttl,
                })
            }
            StorageBackend::S3 { endpoint, bucket, token } => {
                let store = s3::S3LikeStore::new(endpoint, bucket, signer)?
                    .with_bearer_token(token)
                    .with_public_base_url(Some(config.public_base_url));
                Ok(Self { store: Arc::new(store), files: None, url_ttl: config.url_ttl })
            }
        }
    }
}

// =============================================================================
// TEST STORE
// =============================================================================


#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
