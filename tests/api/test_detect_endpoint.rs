// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Detect endpoint tests for POST /detect
//!
//! Verify that the handler:
//! - Passes the decoded image and prompt to the detector
//! - Serialises detections as `{label, score, box}`
//! - Collapses every processing failure into one generic 500
//! - Rejects malformed requests with 422
//! - Logs the full detection result and the request time

use axum::http::StatusCode;
use grounding_dino_serve::{
    api::{create_router, AppState},
    vision::{BoundingBox, Detection},
};
use serde_json::json;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

use super::common::*;

#[tokio::test]
async fn test_detect_returns_detections() {
    let mut detector = MockDetector::new();
    detector
        .expect_predict()
        .withf(|image, prompt| {
            image.dimensions() == (64, 48) && prompt.to_string() == "cat"
        })
        .times(1)
        .returning(|_, _| {
            Ok(vec![Detection {
                label: "cat".to_string(),
                score: 0.75,
                bounding_box: BoundingBox {
                    xmin: 4.0,
                    ymin: 8.0,
                    xmax: 32.0,
                    ymax: 40.0,
                },
            }])
        });

    let app = app_with(Arc::new(detector), None);
    let response = app
        .oneshot(detect_request("cat", &png_bytes(64, 48)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!([{
            "label": "cat",
            "score": 0.75,
            "box": {"xmin": 4.0, "ymin": 8.0, "xmax": 32.0, "ymax": 40.0}
        }])
    );
}

#[tokio::test]
async fn test_no_detections_is_empty_array() {
    let mut detector = MockDetector::new();
    detector.expect_predict().returning(|_, _| Ok(vec![]));

    let app = app_with(Arc::new(detector), None);
    let response = app
        .oneshot(detect_request("unicorn", &png_bytes(16, 16)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!([]));
}

#[tokio::test]
async fn test_prompt_is_url_decoded() {
    let mut detector = MockDetector::new();
    detector
        .expect_predict()
        .withf(|_, prompt| prompt.to_string() == "red car . person")
        .times(1)
        .returning(|_, _| Ok(vec![]));

    let app = app_with(Arc::new(detector), None);
    let response = app
        .oneshot(detect_request("red%20car%20.%20person", &png_bytes(16, 16)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_non_image_payload_is_detection_failed() {
    let mut detector = MockDetector::new();
    detector.expect_predict().times(0);

    let app = app_with(Arc::new(detector), None);
    let response = app
        .oneshot(detect_request("cat", b"definitely not an image"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({"detail": "Detection failed"}));
}

#[tokio::test]
async fn test_empty_payload_is_detection_failed() {
    let mut detector = MockDetector::new();
    detector.expect_predict().times(0);

    let app = app_with(Arc::new(detector), None);
    let response = app.oneshot(detect_request("cat", b"")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({"detail": "Detection failed"}));
}

#[tokio::test]
async fn test_inference_error_is_detection_failed() {
    let mut detector = MockDetector::new();
    detector
        .expect_predict()
        .returning(|_, _| Err(anyhow::anyhow!("session exploded")));

    let app = app_with(Arc::new(detector), None);
    let response = app
        .oneshot(detect_request("cat", &png_bytes(16, 16)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_text(response).await;
    assert_eq!(body, r#"{"detail":"Detection failed"}"#);
    assert!(!body.contains("exploded"));
}

#[tokio::test]
async fn test_missing_detector_is_detection_failed() {
    let app = create_router(AppState::new_for_test(), UPLOAD_LIMIT);
    let response = app
        .oneshot(detect_request("cat", &png_bytes(16, 16)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await, json!({"detail": "Detection failed"}));
}

#[tokio::test]
async fn test_missing_prompt_is_validation_error() {
    let mut detector = MockDetector::new();
    detector.expect_predict().times(0);

    let app = app_with(Arc::new(detector), None);
    let response = app
        .oneshot(detect_request_raw("/detect", "data", &png_bytes(16, 16)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().contains("prompt"));
}

#[tokio::test]
async fn test_missing_data_field_is_validation_error() {
    let mut detector = MockDetector::new();
    detector.expect_predict().times(0);

    let app = app_with(Arc::new(detector), None);
    let response = app
        .oneshot(detect_request_raw(
            "/detect?prompt=cat",
            "file",
            &png_bytes(16, 16),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["detail"].as_str().unwrap().starts_with("data"));
}

#[tokio::test]
async fn test_non_multipart_body_is_validation_error() {
    let mut detector = MockDetector::new();
    detector.expect_predict().times(0);

    let app = app_with(Arc::new(detector), None);
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/detect?prompt=cat")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(r#"{"data": "abc"}"#))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_concurrent_requests_complete() {
    let detector = Arc::new(CountingDetector::default());
    let app = app_with(detector.clone(), None);
    let image = png_bytes(32, 32);

    let mut handles = Vec::new();
    for i in 0..16 {
        let app = app.clone();
        let image = image.clone();
        handles.push(tokio::spawn(async move {
            let prompt = format!("object{}", i);
            let response = app.oneshot(detect_request(&prompt, &image)).await.unwrap();
            (prompt, response.status(), body_json(response).await)
        }));
    }

    for handle in handles {
        let (prompt, status, body) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["label"], prompt.as_str());
        assert_eq!(body[0]["box"]["xmax"], 32.0);
    }
    assert_eq!(detector.calls(), 16);
}

/// In-memory sink for the fmt subscriber
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_result_log_includes_boxes() {
    let logs = LogBuffer::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = app_with(Arc::new(CountingDetector::default()), None);
    let response = app
        .oneshot(detect_request("cat", &png_bytes(20, 10)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = logs.contents();
    assert!(text.contains("Detection result:"), "logs: {}", text);
    assert!(text.contains("label: \"cat\""), "logs: {}", text);
    assert!(text.contains("bounding_box: BoundingBox"), "logs: {}", text);
    assert!(text.contains("xmax: 20.0, ymax: 10.0"), "logs: {}", text);
    assert!(text.contains("Finished generate response:"), "logs: {}", text);
}
