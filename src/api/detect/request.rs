// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection request types: the `prompt` query and the `data` upload

use axum_extra::extract::Multipart;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "data";

/// Query string of `POST /detect`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectParams {
    /// Free-text description of what to look for
    pub prompt: String,
}

/// The uploaded image file, still encoded
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Bytes,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("malformed multipart body: {0}")]
    Malformed(String),

    #[error("field required")]
    MissingField,

    #[error("failed to read upload: {0}")]
    Read(String),
}

impl UploadError {
    /// Whether the client sent the wrong request shape, as opposed to a
    /// failure while reading a well-formed upload
    pub fn is_validation(&self) -> bool {
        matches!(self, UploadError::Malformed(_) | UploadError::MissingField)
    }
}

/// Pull the `data` field out of a multipart body
///
/// Other fields are skipped. The first `data` field wins.
pub async fn extract_upload(multipart: &mut Multipart) -> Result<ImageUpload, UploadError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::Malformed(e.to_string()))?
            .ok_or(UploadError::MissingField)?;

        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| UploadError::Read(e.to_string()))?;

        return Ok(ImageUpload {
            bytes,
            file_name,
            content_type,
        });
    }
}
