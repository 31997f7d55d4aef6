//! Filesystem backend. Objects live at `{root}/{key}`.

use std::path::PathBuf;
use std::time::Duration;

use super::{ObjectStore, StorageError, UrlSigner, validate_key};

pub struct LocalStore {
    root: PathBuf,
    public_base_url: String,
    signer: UrlSigner,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: String, signer: UrlSigner) -> Self {
        Self { root: root.into(), public_base_url: public_base_url.trim_end_matches('/').to_owned(), signer }
    }

    fn path_for_key(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        let path = self.path_for_key(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(%key, "stored object on disk");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for_key(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let path = self.path_for_key(key)?;
        Ok(tokio::fs::try_exists(path).await?)
    }

    fn download_url(&self, key: &str, ttl: Duration) -> Result<String, StorageError> {
        validate_key(key)?;
        Ok(format!("{}/files/{key}?{}", self.public_base_url, self.signer.query(key, ttl)))
    }
}

#[cfg(test)]
#[path = "local_test.rs"]
mod tests;
