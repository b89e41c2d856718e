use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use common::storage::BlobStore;
use common::storage::filesystem::FilesystemBlobStore;
use common::storage::memory::MemoryBlobStore;
use common::storage::s3::S3BlobStore;
use tracing::info;

use crate::config::{StorageBackend, StorageConfig};

/// Build the blob store selected by `storage.backend`.
pub async fn build_blob_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend {
        StorageBackend::S3 => {
            let Some(settings) = &config.s3 else {
                bail!("storage.backend = \"s3\" requires a [storage.s3] section");
            };
            let store = S3BlobStore::new(settings).context("Failed to configure S3 storage")?;
            info!(bucket = %settings.bucket, "Using S3 blob store");
            Ok(Arc::new(store))
        }
        StorageBackend::Filesystem => {
            let path = config
                .path
                .clone()
                .unwrap_or_else(|| PathBuf::from("./media"));
            let store = FilesystemBlobStore::new(path.clone(), config.public_url.clone())
                .await
                .with_context(|| format!("Failed to prepare media directory {}", path.display()))?;
            info!(path = %path.display(), "Using filesystem blob store");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            info!("Using in-memory blob store, blobs are lost on restart");
            Ok(Arc::new(MemoryBlobStore::new(config.public_url.clone())))
        }
    }
}
