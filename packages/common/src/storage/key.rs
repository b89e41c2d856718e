use uuid::Uuid;

use super::error::StorageError;

/// Preferred file extensions for the media types the catalog accepts.
const KNOWN_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("audio/mpeg", "mp3"),
    ("audio/mp3", "mp3"),
    ("audio/wav", "wav"),
    ("audio/x-wav", "wav"),
];

/// Pick a file extension for a content type, falling back to `bin`.
pub fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if let Some((_, ext)) = KNOWN_EXTENSIONS.iter().find(|(ct, _)| *ct == essence) {
        return ext;
    }

    mime_guess::get_mime_extensions_str(&essence)
        .and_then(|exts| exts.first().copied())
        .unwrap_or("bin")
}

/// Build a fresh key of the form `{owner_id}/{folder}/{uuid-v7}.{ext}`.
///
/// Keys are never reused, so an upload can never overwrite a blob another row references.
pub fn generate_key(owner_id: i32, folder: &str, content_type: &str) -> Result<String, StorageError> {
    if folder.is_empty()
        || !folder
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(StorageError::InvalidKey(format!(
            "folder must be [A-Za-z0-9_-]+, got {folder:?}"
        )));
    }

    Ok(format!(
        "{owner_id}/{folder}/{}.{}",
        Uuid::now_v7(),
        extension_for(content_type)
    ))
}

/// Reject keys that could escape the store's namespace.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() {
        return Err(StorageError::InvalidKey("key must not be empty".into()));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!("{key:?} is not relative")));
    }
    if key.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return Err(StorageError::InvalidKey(format!(
            "{key:?} contains an empty or dot segment"
        )));
    }
    Ok(())
}

/// Accept either a bare key or a public URL under `public_base` and return the key.
pub fn key_from_locator<'a>(public_base: &str, locator: &'a str) -> &'a str {
    let base = public_base.trim_end_matches('/');
    locator
        .strip_prefix(base)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(locator)
}
