// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Lifecycle tests: one detector per process, released at shutdown

use axum::http::StatusCode;
use grounding_dino_serve::{
    api::{create_router, AppState, Lifespan},
    vision::{DetectorManager, Device, GroundingDinoConfig},
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

use super::common::*;

#[tokio::test]
async fn test_detector_built_once_for_many_requests() {
    let builds = AtomicUsize::new(0);
    let detector = Arc::new(CountingDetector::default());

    let lifespan = Lifespan::startup_with("cpu", |device| {
        builds.fetch_add(1, Ordering::SeqCst);
        assert_eq!(device, "cpu");
        Ok(DetectorManager::from_detector(detector.clone(), Device::Cpu))
    })
    .unwrap();

    let app = create_router(
        AppState::new(lifespan.slot(), Some(default_metrics())),
        UPLOAD_LIMIT,
    );
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(detect_request("cat", &png_bytes(16, 16)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(detector.calls(), 5);
}

#[tokio::test]
async fn test_requests_fail_after_shutdown() {
    let lifespan = Lifespan::startup_with("cpu", |_| {
        Ok(DetectorManager::from_detector(
            Arc::new(CountingDetector::default()),
            Device::Cpu,
        ))
    })
    .unwrap();

    let app = create_router(AppState::new(lifespan.slot(), None), UPLOAD_LIMIT);
    lifespan.shutdown().await;

    let response = app
        .oneshot(detect_request("cat", &png_bytes(16, 16)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({"detail": "Detection failed"}));
}

#[test]
fn test_builder_failure_aborts_startup() {
    let result = Lifespan::startup_with("cpu", |_| anyhow::bail!("no weights"));
    assert!(result.is_err());
}

#[test]
fn test_startup_without_model_files_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = GroundingDinoConfig {
        model_path: dir.path().join("model.onnx"),
        tokenizer_path: dir.path().join("tokenizer.json"),
        ..Default::default()
    };

    let err = Lifespan::startup(config).unwrap_err();
    assert!(format!("{:#}", err).contains("Detector model not found"));
}
