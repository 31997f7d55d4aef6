//! S3-compatible HTTP backend.
//!
//! Objects are addressed as `{endpoint}/{bucket}/{key}` and written with
//! plain `PUT`/`DELETE`, authenticated by an optional bearer token. Download
//! URLs point at the public base URL and carry the same `expires`/`sig`
//! pair as the local backend, for a fronting gateway to check.

use std::time::Duration;

use reqwest::{Client, StatusCode};

use super::{ObjectStore, StorageError, UrlSigner, validate_key};

const REQUEST_TIMEOUT_SECS: u64 = 60;

pub struct S3LikeStore {
    endpoint: String,
    bucket: String,
    bearer_token: Option<String>,
    public_base_url: Option<String>,
    signer: UrlSigner,
    client: Client,
}

impl S3LikeStore {
    /// # Errors
    ///
    /// Returns `Config` if the HTTP client cannot be built.
    pub fn new(endpoint: String, bucket: String, signer: UrlSigner) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_owned(),
            bucket,
            bearer_token: None,
            public_base_url: None,
            signer,
            client,
        })
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.is_empty());
        self
    }

    #[must_use]
    pub fn with_public_base_url(mut self, base: Option<String>) -> Self {
        self.public_base_url = base
            .map(|x| x.trim_end_matches('/').to_owned())
            .filter(|x| !x.is_empty());
        self
    }

    fn object_url(&self, base: &str, key: &str) -> String {
        format!("{base}/{}/{key}", self.bucket)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.bearer_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3LikeStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let req = self
            .client
            .put(self.object_url(&self.endpoint, key))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(StorageError::Backend(format!("s3-like put failed: {}", resp.status())));
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        let req = self.client.delete(self.object_url(&self.endpoint, key));
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        let status = resp.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(StorageError::Backend(format!("s3-like delete failed: {status}")))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        validate_key(key)?;
        let req = self.client.head(self.object_url(&self.endpoint, key));
        let resp = self
            .authed(req)
            .send()
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
        match resp.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(StorageError::Backend(format!("s3-like head failed: {s}"))),
        }
    }

    fn download_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        validate_key(key)?;
        let base = self.public_base_url.as_deref().unwrap_or(&self.endpoint);
        Ok(format!("{}?{}", self.object_url(base, key), self.signer.query(key, ttl)))
    }
}

#[cfg(test)]
#[path = "s3_test.rs"]
mod tests;
