use async_trait::async_trait;
use bytes::Bytes;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use serde::Deserialize;
use tracing::debug;

use super::blob_ref::BlobRef;
use super::error::StorageError;
use super::key::{key_from_locator, validate_key};
use super::traits::BlobStore;

/// Connection settings for an S3-compatible bucket.
#[derive(Debug, Deserialize, Clone)]
pub struct S3Settings {
    pub bucket: String,
    /// AWS region name, or a free-form label when `endpoint` is set.
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for MinIO, R2, GCS interop and similar services.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub access_key: String,
    pub secret_key: String,
    /// Use `endpoint/bucket/key` addressing instead of virtual-host style.
    #[serde(default)]
    pub path_style: bool,
    /// Public prefix for blob URLs. Defaults to the bucket URL.
    #[serde(default)]
    pub public_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".into()
}

/// Blob store backed by an S3-compatible bucket.
pub struct S3BlobStore {
    bucket: Box<Bucket>,
    public_base: String,
}

impl S3BlobStore {
    pub fn new(settings: &S3Settings) -> Result<Self, StorageError> {
        let region = match &settings.endpoint {
            Some(endpoint) => Region::Custom {
                region: settings.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => settings
                .region
                .parse()
                .map_err(|e| StorageError::Backend(format!("invalid region: {e}")))?,
        };

        let credentials = Credentials::new(
            Some(&settings.access_key),
            Some(&settings.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| StorageError::Backend(format!("invalid credentials: {e}")))?;

        let mut bucket =
            Bucket::new(&settings.bucket, region, credentials).map_err(backend_error)?;
        if settings.path_style {
            bucket = bucket.with_path_style();
        }

        let public_base = settings
            .public_url
            .clone()
            .unwrap_or_else(|| bucket.url())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bucket,
            public_base,
        })
    }

    fn resolve<'a>(&self, key_or_url: &'a str) -> Result<&'a str, StorageError> {
        let key = key_from_locator(&self.public_base, key_or_url);
        validate_key(key)?;
        Ok(key)
    }
}

fn backend_error(err: S3Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<BlobRef, StorageError> {
        validate_key(key)?;
        let response = self
            .bucket
            .put_object_with_content_type(key, &data, content_type)
            .await
            .map_err(backend_error)?;

        let status = response.status_code();
        if !is_success(status) {
            return Err(StorageError::Backend(format!(
                "upload of {key} returned HTTP {status}"
            )));
        }

        debug!(key, size = data.len(), "Uploaded blob");
        Ok(BlobRef::new(key, self.public_url(key)))
    }

    async fn delete(&self, key_or_url: &str) -> Result<bool, StorageError> {
        let key = self.resolve(key_or_url)?;
        let status = match self.bucket.delete_object(key).await {
            Ok(response) => response.status_code(),
            Err(S3Error::HttpFailWithBody(404, _)) => 404,
            Err(e) => return Err(backend_error(e)),
        };

        // S3 answers 204 for missing keys too; 404 only comes from stricter gateways.
        match status {
            404 => Ok(false),
            s if is_success(s) => Ok(true),
            s => Err(StorageError::Backend(format!(
                "delete of {key} returned HTTP {s}"
            ))),
        }
    }

    async fn exists(&self, key_or_url: &str) -> Result<bool, StorageError> {
        let key = self.resolve(key_or_url)?;
        match self.bucket.head_object(key).await {
            Ok((_, status)) if is_success(status) => Ok(true),
            Ok((_, 404)) | Err(S3Error::HttpFailWithBody(404, _)) => Ok(false),
            Ok((_, status)) => Err(StorageError::Backend(format!(
                "head of {key} returned HTTP {status}"
            ))),
            Err(e) => Err(backend_error(e)),
        }
    }

    async fn get(&self, key_or_url: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.resolve(key_or_url)?;
        match self.bucket.get_object(key).await {
            Ok(response) if is_success(response.status_code()) => Ok(response.bytes().to_vec()),
            Ok(response) if response.status_code() == 404 => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Ok(response) => Err(StorageError::Backend(format!(
                "get of {key} returned HTTP {}",
                response.status_code()
            ))),
            Err(S3Error::HttpFailWithBody(404, _)) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(backend_error(e)),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}
