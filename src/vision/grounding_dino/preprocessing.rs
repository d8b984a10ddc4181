// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing for Grounding DINO

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;

/// Target length of the shorter image side
pub const MIN_SIZE: u32 = 800;

/// Upper bound for the longer image side
pub const MAX_SIZE: u32 = 1333;

/// Mean values for normalization (ImageNet)
pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// Std values for normalization (ImageNet)
pub const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// How the image is resized before it enters the network
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResize {
    /// Shorter side to `min`, longer side capped at `max`, aspect preserved
    Aspect { min: u32, max: u32 },
    /// Exact square resize for graphs exported with a fixed input shape
    Square(u32),
}

impl Default for InputResize {
    fn default() -> Self {
        InputResize::Aspect {
            min: MIN_SIZE,
            max: MAX_SIZE,
        }
    }
}

impl InputResize {
    /// Output `(width, height)` for an image of the given size
    pub fn target_dims(&self, width: u32, height: u32) -> (u32, u32) {
        match *self {
            InputResize::Square(size) => (size, size),
            InputResize::Aspect { min, max } => aspect_resize_dims(width, height, min, max),
        }
    }
}

/// Compute the aspect-preserving resize used during training
///
/// The shorter side becomes `min_size` unless that would push the longer side
/// past `max_size`, in which case the shorter side shrinks to fit.
pub fn aspect_resize_dims(width: u32, height: u32, min_size: u32, max_size: u32) -> (u32, u32) {
    let (w, h) = (width.max(1) as f64, height.max(1) as f64);
    let min_orig = w.min(h);
    let max_orig = w.max(h);

    let mut size = min_size as f64;
    if max_orig / min_orig * size > max_size as f64 {
        size = (max_size as f64 * min_orig / max_orig).round();
    }

    let (ow, oh) = if w < h {
        (size, (size * h / w).floor())
    } else {
        ((size * w / h).floor(), size)
    };

    ((ow as u32).max(1), (oh as u32).max(1))
}

/// Preprocess an image for the detector
///
/// Steps:
/// 1. Resize according to `resize` (bilinear)
/// 2. Normalize with ImageNet mean/std: (pixel/255 - mean) / std
/// 3. Convert to NCHW tensor format [1, 3, H, W]
pub fn preprocess_image(image: &RgbImage, resize: InputResize) -> Array4<f32> {
    let (target_w, target_h) = resize.target_dims(image.width(), image.height());

    let resized = if (target_w, target_h) == image.dimensions() {
        image.clone()
    } else {
        image::imageops::resize(image, target_w, target_h, FilterType::Triangle)
    };

    let mut tensor = Array4::zeros((1, 3, target_h as usize, target_w as usize));

    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let normalized = (pixel[c] as f32 / 255.0 - MEAN[c]) / STD[c];
            tensor[[0, c, y as usize, x as usize]] = normalized;
        }
    }

    tensor
}
