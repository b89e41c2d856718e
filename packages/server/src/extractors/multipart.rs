use std::collections::HashMap;

use axum::extract::{FromRequest, Multipart, Request};

use crate::coordinator::BlobInput;
use crate::error::AppError;

/// A multipart body split into text fields and file parts.
///
/// A part with a filename is a file; everything else must be UTF-8 text.
#[derive(Debug, Default)]
pub struct MediaForm {
    fields: HashMap<String, String>,
    files: HashMap<String, BlobInput>,
}

impl MediaForm {
    /// Trimmed text field; empty values count as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn require_text(&self, name: &str) -> Result<String, AppError> {
        self.text(name)
            .map(str::to_owned)
            .ok_or_else(|| AppError::Validation(format!("Field `{name}` is required")))
    }

    pub fn optional_id(&self, name: &str) -> Result<Option<i32>, AppError> {
        self.text(name)
            .map(|v| {
                v.parse::<i32>()
                    .map_err(|_| AppError::Validation(format!("Field `{name}` must be an integer")))
            })
            .transpose()
    }

    pub fn take_file(&mut self, name: &str) -> Option<BlobInput> {
        self.files.remove(name)
    }

    pub fn require_file(&mut self, name: &str) -> Result<BlobInput, AppError> {
        self.take_file(name)
            .ok_or_else(|| AppError::Validation(format!("File `{name}` is required")))
    }
}

impl<S> FromRequest<S> for MediaForm
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::Validation(e.body_text()))?;

        let mut form = MediaForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Multipart error: {e}")))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let is_file = field.file_name().is_some();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_owned();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::Validation(format!("Failed to read `{name}`: {e}")))?;

            if is_file {
                form.files.insert(name, BlobInput::new(content_type, data));
            } else {
                let text = String::from_utf8(data.to_vec()).map_err(|_| {
                    AppError::Validation(format!("Field `{name}` is not valid UTF-8"))
                })?;
                form.fields.insert(name, text);
            }
        }
        Ok(form)
    }
}
