use std::time::Duration;

use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested blob was not found.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The key is empty, absolute, or escapes its namespace.
    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    /// An I/O error occurred.
    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote backend rejected or failed the request.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// The operation did not complete within the configured bound.
    #[error("storage operation timed out after {0:?}")]
    Timeout(Duration),
}
