// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Compute device selection for ONNX Runtime sessions

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Device identifier the service binds its detector to
pub const DEFAULT_DEVICE: &str = "cpu";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Unknown device identifier '{0}' (expected \"cpu\", \"cuda\" or \"cuda:N\")")]
    Unknown(String),

    #[error("Invalid CUDA device index in '{0}'")]
    InvalidIndex(String),
}

/// Compute backend for inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(i32),
}

impl Device {
    /// Execution provider registered on the session builder
    pub fn execution_provider(&self) -> ExecutionProviderDispatch {
        match self {
            Device::Cpu => CPUExecutionProvider::default().build(),
            Device::Cuda(id) => CUDAExecutionProvider::default()
                .with_device_id(*id)
                .build(),
        }
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl FromStr for Device {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            other => match other.strip_prefix("cuda:") {
                Some(index) => index
                    .parse::<i32>()
                    .ok()
                    .filter(|i| *i >= 0)
                    .map(Device::Cuda)
                    .ok_or_else(|| DeviceError::InvalidIndex(s.to_string())),
                None => Err(DeviceError::Unknown(s.to_string())),
            },
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Cuda(id) => write!(f, "cuda:{}", id),
        }
    }
}
