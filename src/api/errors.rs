// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detail returned for every failed detection
pub const DETECTION_FAILED_DETAIL: &str = "Detection failed";

/// JSON error body: `{"detail": "..."}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub detail: String,
}

#[derive(Debug, Clone)]
pub enum ApiError {
    /// Anything that went wrong between reading the upload and running the model
    DetectionFailed,
    /// The request did not have the shape the endpoint expects
    ValidationError { field: String, message: String },
    NotFound(String),
    /// Metrics could not be rendered
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let detail = match self {
            ApiError::DetectionFailed => DETECTION_FAILED_DETAIL.to_string(),
            ApiError::ValidationError { field, message } => format!("{}: {}", field, message),
            ApiError::NotFound(_) => "Not Found".to_string(),
            ApiError::InternalError(_) => "Internal Server Error".to_string(),
        };

        ErrorResponse { detail }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::DetectionFailed | ApiError::InternalError(_) => 500,
            ApiError::ValidationError { .. } => 422,
            ApiError::NotFound(_) => 404,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::DetectionFailed => write!(f, "{}", DETECTION_FAILED_DETAIL),
            ApiError::ValidationError { field, message } => {
                write!(f, "Validation error for {}: {}", field, message)
            }
            ApiError::NotFound(path) => write!(f, "Not found: {}", path),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}
