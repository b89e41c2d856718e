use async_trait::async_trait;
use bytes::Bytes;

use super::blob_ref::BlobRef;
use super::error::StorageError;
use super::key::generate_key;

/// Path-addressed blob storage with public locators.
///
/// Each single-blob operation is atomic; nothing is coordinated across blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a fresh `{owner_id}/{folder}/...` key.
    async fn upload(
        &self,
        owner_id: i32,
        folder: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<BlobRef, StorageError> {
        let key = generate_key(owner_id, folder, content_type)?;
        self.put(&key, data, content_type).await
    }

    /// Store bytes under an explicit key and return its reference.
    async fn put(&self, key: &str, data: Bytes, content_type: &str)
    -> Result<BlobRef, StorageError>;

    /// Delete a blob by key or public URL.
    ///
    /// Returns `true` if the blob was deleted, `false` if it did not exist.
    /// A missing blob is never an error, so compensation and delete retries are safe.
    async fn delete(&self, key_or_url: &str) -> Result<bool, StorageError>;

    /// Check whether a blob exists.
    async fn exists(&self, key_or_url: &str) -> Result<bool, StorageError>;

    /// Retrieve all bytes for a blob.
    async fn get(&self, key_or_url: &str) -> Result<Vec<u8>, StorageError>;

    /// Public locator for a key.
    fn public_url(&self, key: &str) -> String;
}
