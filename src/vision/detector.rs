// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector contract shared by the request handler and model backends

use anyhow::Result;
use image::RgbImage;

/// Axis-aligned box in original-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    /// Build from a normalised `(cx, cy, w, h)` box, scaled to an image and
    /// clamped to its bounds.
    pub fn from_normalized_cxcywh(cxcywh: [f32; 4], image_width: u32, image_height: u32) -> Self {
        let [cx, cy, w, h] = cxcywh;
        let (iw, ih) = (image_width as f32, image_height as f32);

        Self {
            xmin: ((cx - w / 2.0) * iw).clamp(0.0, iw),
            ymin: ((cy - h / 2.0) * ih).clamp(0.0, ih),
            xmax: ((cx + w / 2.0) * iw).clamp(0.0, iw),
            ymax: ((cy + h / 2.0) * ih).clamp(0.0, ih),
        }
    }

    pub fn width(&self) -> f32 {
        (self.xmax - self.xmin).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.ymax - self.ymin).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }
}

/// One object found in an image
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Phrase from the prompt the box was grounded to
    pub label: String,
    /// Confidence score (0.0-1.0)
    pub score: f32,
    pub bounding_box: BoundingBox,
}

/// An open-vocabulary object detector
///
/// Implementations are shared across concurrent requests behind an `Arc`, so
/// `predict` takes `&self` and must synchronise any mutable internals.
pub trait ObjectDetector: Send + Sync {
    /// Detect the objects described by `prompt` in `image`
    fn predict(&self, image: &RgbImage, prompt: &str) -> Result<Vec<Detection>>;

    /// Model name reported in logs
    fn name(&self) -> String {
        "object-detector".to_string()
    }
}
