mod blob_ref;
mod error;
mod key;
mod traits;

pub mod filesystem;
pub mod memory;
#[cfg(feature = "object-storage")]
pub mod s3;

pub use blob_ref::BlobRef;
pub use error::StorageError;
pub use key::{extension_for, generate_key, key_from_locator, validate_key};
pub use traits::BlobStore;
