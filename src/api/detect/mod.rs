// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection API endpoint module
//!
//! Provides POST /detect for open-vocabulary object detection.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::{detect_handler, DetectionError};
pub use request::{DetectParams, ImageUpload, UploadError, UPLOAD_FIELD};
pub use response::{BoxViewModel, ObjectDetectionViewModel};
