// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing for open-vocabulary object detection
//!
//! This module provides:
//! - Upload decoding into colour images
//! - The `ObjectDetector` contract
//! - A Grounding DINO backend on ONNX Runtime

pub mod detector;
pub mod device;
pub mod grounding_dino;
pub mod image_utils;
pub mod model_manager;

pub use detector::{BoundingBox, Detection, ObjectDetector};
pub use device::{Device, DeviceError, DEFAULT_DEVICE};
pub use grounding_dino::{GroundingDinoConfig, GroundingDinoModel, InputResize};
pub use image_utils::{decode_image_bytes, detect_format, ImageError, ImageInfo};
pub use model_manager::{DetectorInfo, DetectorManager};
