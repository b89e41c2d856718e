use serde::Deserialize;

use super::{BlobInput, CoordinatorError};

/// Accepted content types and size ceiling for one blob slot.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SlotPolicy {
    pub allowed_types: Vec<String>,
    pub max_bytes: u64,
}

impl SlotPolicy {
    pub fn new<I, S>(allowed_types: I, max_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_types: allowed_types.into_iter().map(Into::into).collect(),
            max_bytes,
        }
    }

    /// Reject an input whose type is not listed or whose size exceeds the ceiling.
    ///
    /// Content type matching ignores case and any `; parameter` suffix.
    pub fn check(&self, field: &'static str, input: &BlobInput) -> Result<(), CoordinatorError> {
        let essence = input
            .content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        if !self
            .allowed_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
        {
            return Err(CoordinatorError::validation(
                field,
                format!(
                    "Invalid file type {:?}. Allowed types: {}",
                    input.content_type,
                    self.allowed_types.join(", ")
                ),
            ));
        }
        if input.data.is_empty() {
            return Err(CoordinatorError::validation(field, "File is empty"));
        }
        if input.size() > self.max_bytes {
            return Err(CoordinatorError::validation(
                field,
                format!(
                    "File is {} bytes, limit is {} bytes",
                    input.size(),
                    self.max_bytes
                ),
            ));
        }
        Ok(())
    }
}

/// Validation table for every slot the coordinator writes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MediaPolicy {
    #[serde(default = "default_cover")]
    pub cover: SlotPolicy,
    #[serde(default = "default_audio")]
    pub audio: SlotPolicy,
}

fn default_cover() -> SlotPolicy {
    SlotPolicy::new(["image/jpeg", "image/png"], 1024 * 1024)
}

fn default_audio() -> SlotPolicy {
    SlotPolicy::new(["audio/mpeg", "audio/mp3", "audio/wav"], 20 * 1024 * 1024)
}

impl Default for MediaPolicy {
    fn default() -> Self {
        Self {
            cover: default_cover(),
            audio: default_audio(),
        }
    }
}
