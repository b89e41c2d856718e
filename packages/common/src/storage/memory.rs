use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::blob_ref::BlobRef;
use super::error::StorageError;
use super::key::{key_from_locator, validate_key};
use super::traits::BlobStore;

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: String,
}

/// In-process blob store for local development and tests.
pub struct MemoryBlobStore {
    public_base: String,
    blobs: DashMap<String, StoredBlob>,
}

impl MemoryBlobStore {
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            public_base: public_base.into().trim_end_matches('/').to_string(),
            blobs: DashMap::new(),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.blobs.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn contains(&self, key_or_url: &str) -> bool {
        self.blobs
            .contains_key(key_from_locator(&self.public_base, key_or_url))
    }

    pub fn content_type(&self, key_or_url: &str) -> Option<String> {
        self.blobs
            .get(key_from_locator(&self.public_base, key_or_url))
            .map(|b| b.content_type.clone())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<BlobRef, StorageError> {
        validate_key(key)?;
        self.blobs.insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.to_string(),
            },
        );
        Ok(BlobRef::new(key, self.public_url(key)))
    }

    async fn delete(&self, key_or_url: &str) -> Result<bool, StorageError> {
        let key = key_from_locator(&self.public_base, key_or_url);
        Ok(self.blobs.remove(key).is_some())
    }

    async fn exists(&self, key_or_url: &str) -> Result<bool, StorageError> {
        Ok(self.contains(key_or_url))
    }

    async fn get(&self, key_or_url: &str) -> Result<Vec<u8>, StorageError> {
        let key = key_from_locator(&self.public_base, key_or_url);
        self.blobs
            .get(key)
            .map(|b| b.data.to_vec())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}
