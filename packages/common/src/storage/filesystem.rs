use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;

use super::blob_ref::BlobRef;
use super::error::StorageError;
use super::key::{key_from_locator, validate_key};
use super::traits::BlobStore;

/// Filesystem-backed blob store serving blobs from a static URL prefix.
///
/// Blobs live at `{base_path}/{key}`; the file server in front of `base_path`
/// is expected to expose them under `public_base`.
pub struct FilesystemBlobStore {
    base_path: PathBuf,
    public_base: String,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store.
    pub async fn new(
        base_path: PathBuf,
        public_base: impl Into<String>,
    ) -> Result<Self, StorageError> {
        fs::create_dir_all(&base_path).await?;
        fs::create_dir_all(base_path.join(".tmp")).await?;
        Ok(Self {
            base_path,
            public_base: public_base.into().trim_end_matches('/').to_string(),
        })
    }

    fn blob_path(&self, key_or_url: &str) -> Result<PathBuf, StorageError> {
        let key = key_from_locator(&self.public_base, key_or_url);
        validate_key(key)?;
        Ok(self.base_path.join(key))
    }

    /// Path for a temporary file during writes.
    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join(".tmp")
            .join(uuid::Uuid::new_v4().to_string())
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> Result<BlobRef, StorageError> {
        validate_key(key)?;
        let blob_path = self.base_path.join(key);

        let temp_path = self.temp_path();
        if let Err(e) = fs::write(&temp_path, &data).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Rename is atomic, so readers never observe a half-written blob.
        if let Err(e) = fs::rename(&temp_path, &blob_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(BlobRef::new(key, self.public_url(key)))
    }

    async fn delete(&self, key_or_url: &str) -> Result<bool, StorageError> {
        let blob_path = self.blob_path(key_or_url)?;
        match fs::remove_file(&blob_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key_or_url: &str) -> Result<bool, StorageError> {
        let blob_path = self.blob_path(key_or_url)?;
        Ok(fs::try_exists(&blob_path).await?)
    }

    async fn get(&self, key_or_url: &str) -> Result<Vec<u8>, StorageError> {
        let blob_path = self.blob_path(key_or_url)?;
        match fs::read(&blob_path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key_or_url.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}
