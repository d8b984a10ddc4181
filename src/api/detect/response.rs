// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection response types

use serde::{Deserialize, Serialize};

use crate::vision::{BoundingBox, Detection};

/// Box corners in original image pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoxViewModel {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

/// One detection as returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDetectionViewModel {
    /// Prompt phrase the box is grounded to
    pub label: String,
    /// Confidence (0.0-1.0)
    pub score: f32,
    #[serde(rename = "box")]
    pub bounding_box: BoxViewModel,
}

impl From<BoundingBox> for BoxViewModel {
    fn from(b: BoundingBox) -> Self {
        Self {
            xmin: b.xmin,
            ymin: b.ymin,
            xmax: b.xmax,
            ymax: b.ymax,
        }
    }
}

impl From<Detection> for ObjectDetectionViewModel {
    fn from(d: Detection) -> Self {
        Self {
            label: d.label,
            score: d.score,
            bounding_box: d.bounding_box.into(),
        }
    }
}
