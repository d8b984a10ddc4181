// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Process lifecycle: build the detector before serving, drop it after

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::vision::{DetectorManager, GroundingDinoConfig, DEFAULT_DEVICE};

/// Shared slot the request handlers read the detector from
pub type DetectorSlot = Arc<RwLock<Option<Arc<DetectorManager>>>>;

/// Owns the detector for the lifetime of the server
#[derive(Debug)]
pub struct Lifespan {
    slot: DetectorSlot,
}

impl Lifespan {
    /// Load Grounding DINO on the CPU
    pub fn startup(config: GroundingDinoConfig) -> Result<Self> {
        Self::startup_with(DEFAULT_DEVICE, |device| {
            DetectorManager::new(config, device)
        })
    }

    /// Build the detector with `builder`, called exactly once with `device`
    pub fn startup_with<F>(device: &str, builder: F) -> Result<Self>
    where
        F: FnOnce(&str) -> Result<DetectorManager>,
    {
        info!("🚀 Loading detector on {}", device);

        let manager = builder(device).context("Failed to initialize detector")?;
        info!("✅ Detector loaded: {:?}", manager.info());

        Ok(Self {
            slot: Arc::new(RwLock::new(Some(Arc::new(manager)))),
        })
    }

    pub fn slot(&self) -> DetectorSlot {
        self.slot.clone()
    }

    pub async fn is_loaded(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Release the detector; requests still in flight keep their `Arc`
    pub async fn shutdown(self) {
        if self.slot.write().await.take().is_some() {
            info!("Detector released");
        }
    }
}
