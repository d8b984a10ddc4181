// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Grounding DINO integration for open-vocabulary detection
//!
//! Components:
//! - `preprocessing` - Image resize and normalisation
//! - `text` - Prompt tokenisation and phrase masks
//! - `postprocessing` - Box/phrase selection from raw outputs
//! - `model` - ONNX Runtime session wrapper

pub mod model;
pub mod postprocessing;
pub mod preprocessing;
pub mod text;

pub use model::{GroundingDinoConfig, GroundingDinoModel, MODEL_NAME};
pub use preprocessing::InputResize;
