// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection endpoint handler

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::Json;
use axum_extra::extract::multipart::MultipartRejection;
use axum_extra::extract::Multipart;
use bytes::Bytes;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

use super::request::{extract_upload, DetectParams, UPLOAD_FIELD};
use super::response::ObjectDetectionViewModel;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::vision::image_utils::format_to_extension;
use crate::vision::{decode_image_bytes, Detection, ImageError};

/// Why a detection request failed
///
/// Only ever logged; clients always see the generic failure.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("detector is not loaded")]
    Unavailable,

    #[error("failed to read upload: {0}")]
    Read(String),

    #[error(transparent)]
    Decode(#[from] ImageError),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("detection task failed: {0}")]
    Join(#[from] JoinError),
}

impl From<DetectionError> for ApiError {
    fn from(_: DetectionError) -> Self {
        ApiError::DetectionFailed
    }
}

/// POST /detect?prompt=... - Detect objects described by a prompt
///
/// # Request
/// - `prompt` query parameter: free-text description of the objects
/// - multipart field `data`: the image file (PNG, JPEG, WebP, GIF)
///
/// # Response
/// JSON array of `{label, score, box: {xmin, ymin, xmax, ymax}}`, possibly
/// empty.
///
/// # Errors
/// - 422: missing `prompt`, body is not multipart, or no `data` field
/// - 500 `{"detail": "Detection failed"}`: anything else
pub async fn detect_handler(
    State(state): State<AppState>,
    params: Result<Query<DetectParams>, QueryRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Vec<ObjectDetectionViewModel>>, ApiError> {
    let start = Instant::now();

    let Query(params) = params.map_err(|e| {
        warn!("Rejected detect request: {}", e);
        ApiError::ValidationError {
            field: "prompt".to_string(),
            message: "field required".to_string(),
        }
    })?;

    let mut multipart = multipart.map_err(|e| {
        warn!("Rejected detect request: {}", e);
        ApiError::ValidationError {
            field: UPLOAD_FIELD.to_string(),
            message: e.to_string(),
        }
    })?;

    let upload = match extract_upload(&mut multipart).await {
        Ok(upload) => upload,
        Err(e) if e.is_validation() => {
            warn!("Rejected detect request: {}", e);
            return Err(ApiError::ValidationError {
                field: UPLOAD_FIELD.to_string(),
                message: e.to_string(),
            });
        }
        Err(e) => return Err(failed(DetectionError::Read(e.to_string()))),
    };

    debug!(
        prompt = %params.prompt,
        file_name = ?upload.file_name,
        content_type = ?upload.content_type,
        size = upload.bytes.len(),
        "Detect request received"
    );

    let (detections, elapsed) = run_detection(&state, params.prompt.clone(), upload.bytes, start)
        .await
        .map_err(failed)?;

    info!(prompt = %params.prompt, "Detection result: {:?}", detections);
    info!(
        "Finished generate response: {:.2} seconds",
        elapsed.as_secs_f64()
    );

    Ok(Json(
        detections
            .into_iter()
            .map(ObjectDetectionViewModel::from)
            .collect(),
    ))
}

fn failed(e: DetectionError) -> ApiError {
    error!("Detection failed: {}", e);
    e.into()
}

/// Decode and predict on the blocking pool; returns detections and the
/// time elapsed since `started`
async fn run_detection(
    state: &AppState,
    prompt: String,
    bytes: Bytes,
    started: Instant,
) -> Result<(Vec<Detection>, Duration), DetectionError> {
    let detector = {
        let guard = state.detectors.read().await;
        guard
            .as_ref()
            .map(|manager| manager.detector())
            .ok_or(DetectionError::Unavailable)?
    };

    tokio::task::spawn_blocking(move || -> Result<_, DetectionError> {
        let (image, image_info) = decode_image_bytes(&bytes)?;
        debug!(
            "Decoded {} image: {}x{}, {} bytes",
            format_to_extension(image_info.format),
            image_info.width,
            image_info.height,
            image_info.size_bytes
        );

        let detections = detector
            .predict(&image, &prompt)
            .map_err(DetectionError::Inference)?;

        Ok((detections, started.elapsed()))
    })
    .await?
}
