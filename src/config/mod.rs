// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Server configuration from command-line flags and environment variables

use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args, Parser};
use std::path::PathBuf;

use crate::monitoring::MetricsConfig;
use crate::vision::grounding_dino::postprocessing::{
    DEFAULT_BOX_THRESHOLD, DEFAULT_TEXT_THRESHOLD,
};
use crate::vision::{GroundingDinoConfig, InputResize};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_METRICS_NAMESPACE: &str = "fastapi";
pub const DEFAULT_METRICS_SUBSYSTEM: &str = "model";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MODEL_PATH: &str = "./models/grounding-dino-onnx/model.onnx";
pub const DEFAULT_TOKENIZER_PATH: &str = "./models/grounding-dino-onnx/tokenizer.json";
pub const DEFAULT_INTRA_THREADS: usize = 4;

#[derive(Parser, Debug, Clone)]
#[command(name = "grounding-dino-serve")]
#[command(version)]
#[command(about = "Open-vocabulary object detection over HTTP", long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "API_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, env = "API_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Prefix of every metric name
    #[arg(long, env = "METRICS_NAMESPACE", default_value = DEFAULT_METRICS_NAMESPACE)]
    pub metrics_namespace: String,

    #[arg(long, env = "METRICS_SUBSYSTEM", default_value = DEFAULT_METRICS_SUBSYSTEM)]
    pub metrics_subsystem: String,

    /// Instrument requests and serve /metrics
    #[arg(
        long,
        env = "ENABLE_METRICS",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub enable_metrics: bool,

    /// Largest accepted request body
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_upload_bytes: usize,

    #[command(flatten)]
    pub detector: DetectorArgs,
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct DetectorArgs {
    /// Grounding DINO ONNX graph
    #[arg(long, env = "DETECTOR_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    /// BERT tokenizer.json matching the graph
    #[arg(long, env = "DETECTOR_TOKENIZER_PATH", default_value = DEFAULT_TOKENIZER_PATH)]
    pub tokenizer_path: PathBuf,

    #[arg(long, env = "BOX_THRESHOLD", default_value_t = DEFAULT_BOX_THRESHOLD)]
    pub box_threshold: f32,

    #[arg(long, env = "TEXT_THRESHOLD", default_value_t = DEFAULT_TEXT_THRESHOLD)]
    pub text_threshold: f32,

    /// Fixed square input size for graphs exported with static shapes
    #[arg(long, env = "DETECTOR_INPUT_SIZE")]
    pub input_size: Option<u32>,

    #[arg(long, env = "DETECTOR_THREADS", default_value_t = DEFAULT_INTRA_THREADS)]
    pub intra_threads: usize,
}

impl Default for DetectorArgs {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            tokenizer_path: PathBuf::from(DEFAULT_TOKENIZER_PATH),
            box_threshold: DEFAULT_BOX_THRESHOLD,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            input_size: None,
            intra_threads: DEFAULT_INTRA_THREADS,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            metrics_namespace: DEFAULT_METRICS_NAMESPACE.to_string(),
            metrics_subsystem: DEFAULT_METRICS_SUBSYSTEM.to_string(),
            enable_metrics: true,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            detector: DetectorArgs::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            namespace: self.metrics_namespace.clone(),
            subsystem: self.metrics_subsystem.clone(),
            ..Default::default()
        }
    }

    pub fn detector_config(&self) -> GroundingDinoConfig {
        let d = &self.detector;
        GroundingDinoConfig {
            model_path: d.model_path.clone(),
            tokenizer_path: d.tokenizer_path.clone(),
            box_threshold: d.box_threshold,
            text_threshold: d.text_threshold,
            resize: d
                .input_size
                .map(InputResize::Square)
                .unwrap_or_default(),
            intra_threads: d.intra_threads,
        }
    }
}
