use serde::{Deserialize, Serialize};

/// A stored binary asset: the bucket key plus the public locator returned by the upload.
///
/// Never mutated. Replacing an asset means uploading a new blob and deleting the old one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlobRef {
    pub key: String,
    pub url: String,
}

impl BlobRef {
    pub fn new(key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            url: url.into(),
        }
    }
}
