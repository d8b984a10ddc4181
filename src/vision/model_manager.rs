// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detector manager owning the process-wide detector instance

use std::sync::Arc;

use crate::vision::detector::ObjectDetector;
use crate::vision::device::Device;
use crate::vision::grounding_dino::{GroundingDinoConfig, GroundingDinoModel};

/// Information about the loaded detector
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorInfo {
    /// Model name
    pub name: String,
    /// Device the model runs on
    pub device: Device,
}

/// Holds the one detector shared by every request
///
/// Built once at startup; handlers borrow the detector through
/// [`DetectorManager::detector`].
pub struct DetectorManager {
    detector: Arc<dyn ObjectDetector>,
    device: Device,
}

impl DetectorManager {
    /// Load Grounding DINO for the given device identifier
    ///
    /// Unlike optional models elsewhere, a failure here is returned to the
    /// caller: the service cannot run without its detector.
    pub fn new(config: GroundingDinoConfig, device: &str) -> anyhow::Result<Self> {
        let device: Device = device.parse()?;
        let model = GroundingDinoModel::new(config, device)?;
        tracing::info!("✅ Detector ready: {} on {}", model.name(), device);

        Ok(Self::from_detector(Arc::new(model), device))
    }

    /// Wrap an already constructed detector
    pub fn from_detector(detector: Arc<dyn ObjectDetector>, device: Device) -> Self {
        Self { detector, device }
    }

    /// Get the shared detector
    pub fn detector(&self) -> Arc<dyn ObjectDetector> {
        self.detector.clone()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn info(&self) -> DetectorInfo {
        DetectorInfo {
            name: self.detector.name(),
            device: self.device,
        }
    }
}

impl std::fmt::Debug for DetectorManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorManager")
            .field("detector", &self.detector.name())
            .field("device", &self.device)
            .finish()
    }
}
