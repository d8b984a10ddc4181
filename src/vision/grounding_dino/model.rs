// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Grounding DINO ONNX model wrapper

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::{Array2, Array4, Axis, Ix2};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::postprocessing::{
    clean_phrase, select_queries, DEFAULT_BOX_THRESHOLD, DEFAULT_TEXT_THRESHOLD,
};
use super::preprocessing::{preprocess_image, InputResize};
use super::text::{
    encode_caption, preprocess_caption, special_token_ids, TextInputs, MAX_TEXT_LEN,
};
use crate::vision::detector::{BoundingBox, Detection, ObjectDetector};
use crate::vision::device::Device;

/// Model name reported in logs
pub const MODEL_NAME: &str = "grounding-dino";

/// Loading and thresholding options for [`GroundingDinoModel`]
#[derive(Debug, Clone)]
pub struct GroundingDinoConfig {
    /// Path to the exported ONNX graph
    pub model_path: PathBuf,
    /// Path to the BERT `tokenizer.json`
    pub tokenizer_path: PathBuf,
    /// Minimum query score for a box to be returned
    pub box_threshold: f32,
    /// Minimum token score for a token to be part of the label
    pub text_threshold: f32,
    pub resize: InputResize,
    /// ONNX Runtime intra-op threads
    pub intra_threads: usize,
}

impl Default for GroundingDinoConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/grounding-dino-onnx/model.onnx"),
            tokenizer_path: PathBuf::from("./models/grounding-dino-onnx/tokenizer.json"),
            box_threshold: DEFAULT_BOX_THRESHOLD,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            resize: InputResize::default(),
            intra_threads: 4,
        }
    }
}

/// Grounding DINO open-vocabulary detector
///
/// Inputs of the exported graph, in order: `img`, `input_ids`,
/// `attention_mask` (phrase self-attention), `position_ids`,
/// `token_type_ids`, `text_token_mask`. Outputs: `logits`
/// `[1, queries, 256]` and `boxes` `[1, queries, 4]` (normalised cxcywh).
#[derive(Clone)]
pub struct GroundingDinoModel {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    special_ids: Vec<i64>,
    config: GroundingDinoConfig,
    device: Device,
}

impl std::fmt::Debug for GroundingDinoModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundingDinoModel")
            .field("config", &self.config)
            .field("device", &self.device)
            .field("special_ids", &self.special_ids)
            .finish_non_exhaustive()
    }
}

impl GroundingDinoModel {
    /// Load the detector graph and tokenizer for a device
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found
    /// - ONNX Runtime initialization fails
    /// - The tokenizer lacks the phrase separator tokens
    pub fn new(config: GroundingDinoConfig, device: Device) -> Result<Self> {
        let model_path = config.model_path.as_path();
        let tokenizer_path = config.tokenizer_path.as_path();

        if !model_path.exists() {
            anyhow::bail!("Detector model not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!(
            "Loading Grounding DINO from {} on {}",
            model_path.display(),
            device
        );

        let session = build_session(model_path, device, config.intra_threads)?;

        debug!(
            inputs = ?session.inputs.iter().map(|i| i.name.as_str()).collect::<Vec<_>>(),
            outputs = ?session.outputs.iter().map(|o| o.name.as_str()).collect::<Vec<_>>(),
            "Detector graph loaded"
        );

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        let special_ids = special_token_ids(&tokenizer);
        if special_ids.len() < 3 {
            anyhow::bail!(
                "Tokenizer at {} is missing phrase separator tokens",
                tokenizer_path.display()
            );
        }

        info!("✅ Grounding DINO loaded ({})", device);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            special_ids,
            config,
            device,
        })
    }

    pub fn config(&self) -> &GroundingDinoConfig {
        &self.config
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Run the graph and return `(logits, boxes)` for the single batch item
    fn infer(
        &self,
        pixels: Array4<f32>,
        text: TextInputs,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        let len = text.len();

        let input_ids = Array2::from_shape_vec((1, len), text.input_ids)
            .context("Failed to create input_ids array")?;
        let attention_mask = text
            .self_attention_mask
            .into_shape_with_order((1, len, len))
            .context("Failed to create attention_mask array")?;
        let position_ids = Array2::from_shape_vec((1, len), text.position_ids)
            .context("Failed to create position_ids array")?;
        let token_type_ids = Array2::from_shape_vec((1, len), text.token_type_ids)
            .context("Failed to create token_type_ids array")?;
        let text_token_mask = Array2::from_shape_vec((1, len), text.token_mask)
            .context("Failed to create text_token_mask array")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Detector session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![
                "img" => Value::from_array(pixels)?,
                "input_ids" => Value::from_array(input_ids)?,
                "attention_mask" => Value::from_array(attention_mask)?,
                "position_ids" => Value::from_array(position_ids)?,
                "token_type_ids" => Value::from_array(token_type_ids)?,
                "text_token_mask" => Value::from_array(text_token_mask)?
            ])
            .context("Detection inference failed")?;

        // Index access: exported graphs disagree on output names
        let logits = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract logits tensor")?
            .index_axis(Axis(0), 0)
            .to_owned()
            .into_dimensionality::<Ix2>()
            .context("Unexpected logits shape")?;
        let boxes = outputs[1]
            .try_extract_array::<f32>()
            .context("Failed to extract boxes tensor")?
            .index_axis(Axis(0), 0)
            .to_owned()
            .into_dimensionality::<Ix2>()
            .context("Unexpected boxes shape")?;

        if boxes.ncols() != 4 {
            anyhow::bail!("Expected 4 box coordinates, got {}", boxes.ncols());
        }

        Ok((logits, boxes))
    }

    fn decode_phrase(&self, token_ids: &[i64]) -> Result<String> {
        let ids: Vec<u32> = token_ids.iter().map(|&id| id as u32).collect();
        let decoded = self
            .tokenizer
            .decode(&ids, true)
            .map_err(|e| anyhow::anyhow!("Failed to decode phrase: {}", e))?;
        Ok(clean_phrase(&decoded))
    }
}

impl ObjectDetector for GroundingDinoModel {
    fn predict(&self, image: &RgbImage, prompt: &str) -> Result<Vec<Detection>> {
        let start = Instant::now();

        let caption = preprocess_caption(prompt);
        let text = encode_caption(&self.tokenizer, &caption, &self.special_ids, MAX_TEXT_LEN)?;
        let input_ids = text.input_ids.clone();
        let pixels = preprocess_image(image, self.config.resize);

        debug!(
            caption = %caption,
            tokens = input_ids.len(),
            input_shape = ?pixels.shape(),
            "Running Grounding DINO"
        );

        let (logits, boxes) = self.infer(pixels, text)?;

        let detections = select_queries(
            logits.view(),
            boxes.view(),
            &input_ids,
            self.config.box_threshold,
            self.config.text_threshold,
        )
        .into_iter()
        .map(|m| {
            Ok(Detection {
                label: self.decode_phrase(&m.phrase_token_ids)?,
                score: m.score,
                bounding_box: BoundingBox::from_normalized_cxcywh(
                    m.cxcywh,
                    image.width(),
                    image.height(),
                ),
            })
        })
        .collect::<Result<Vec<_>>>()?;

        debug!(
            "Detected {} objects in {}ms",
            detections.len(),
            start.elapsed().as_millis()
        );

        Ok(detections)
    }

    fn name(&self) -> String {
        MODEL_NAME.to_string()
    }
}

fn build_session(model_path: &Path, device: Device, intra_threads: usize) -> Result<Session> {
    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([device.execution_provider()])
        .context("Failed to set execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load detector model from {}",
            model_path.display()
        ))
}
