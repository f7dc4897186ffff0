//! Buffers a `multipart/form-data` body into text fields plus one file part.

use std::collections::HashMap;

use actix_multipart::{Multipart, MultipartError};
use bytes::{Bytes, BytesMut};
use fl_core::AppError;
use futures_util::StreamExt;

use crate::error::ApiError;

#[derive(Debug)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Default)]
pub struct FormParts {
    fields: HashMap<String, String>,
    pub file: Option<UploadedFile>,
}

impl FormParts {
    /// A trimmed, non-empty text field.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
    }
}

fn bad_multipart(err: MultipartError) -> ApiError {
    AppError::invalid(format!("malformed multipart body: {err}")).into()
}

/// Reads every part. The part named `file_field` is kept as bytes; the total
/// body may not exceed `limit` bytes.
pub async fn read_form(mut payload: Multipart, file_field: &str, limit: usize) -> Result<FormParts, ApiError> {
    let mut parts = FormParts::default();
    let mut total = 0usize;

    while let Some(field) = payload.next().await {
        let mut field = field.map_err(bad_multipart)?;
        let disposition = field.content_disposition();
        let name = disposition.get_name().unwrap_or_default().to_string();
        let filename = disposition.get_filename().map(str::to_string);
        let content_type = field.content_type().map(|m| m.essence_str().to_string());

        let mut buf = BytesMut::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(bad_multipart)?;
            total += chunk.len();
            if total > limit {
                return Err(AppError::invalid(format!("request body exceeds {limit} bytes")).into());
            }
            buf.extend_from_slice(&chunk);
        }

        if name == file_field {
            parts.file = Some(UploadedFile { filename, content_type, data: buf.freeze() });
        } else {
            parts.fields.insert(name, String::from_utf8_lossy(&buf).into_owned());
        }
    }
    Ok(parts)
}
