// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Every flag can also be set through a `MYCO_*` environment variable. The
//! binaries load a `.env` file (if present) before parsing.

use anyhow::{Context, Result};
use clap::{Args, Parser};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

use crate::assessment::{GenerationConfig, DEFAULT_MAX_LENGTH};
use crate::inference::{
    CoordinateSpace, InferenceSettings, ModelKind, DEFAULT_MIN_CONFIDENCE, DEFAULT_TOP_K,
};
use crate::models::{ArtifactConfig, ClassTable, DEFAULT_MIN_BYTES};
use crate::vision::{ColorOrder, InputSpec, Normalization, TensorLayout};

/// Mushroom disease inference service
#[derive(Parser, Debug, Clone)]
#[command(name = "mycoserve")]
#[command(version = crate::version::VERSION)]
#[command(about = "HTTP inference service for mushroom disease classification", long_about = None)]
pub struct ServiceConfig {
    /// Address to bind
    #[arg(long, env = "MYCO_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "MYCO_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Exit instead of serving degraded when a model fails to load
    #[arg(long, env = "MYCO_STRICT_STARTUP")]
    pub strict_startup: bool,

    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(flatten)]
    pub scoring: ScoringModelArgs,

    #[command(flatten)]
    pub generator: GeneratorArgs,
}

impl ServiceConfig {
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    pub fn validate(&self) -> Result<()> {
        self.bind_addr()?;
        self.scoring.validate()?;
        self.generator.validate()
    }
}

/// Settings shared by every ONNX session and download
#[derive(Args, Debug, Clone)]
pub struct RuntimeArgs {
    /// Intra-op threads per ONNX session
    #[arg(long, env = "MYCO_INTRA_THREADS", default_value_t = 4)]
    pub intra_threads: usize,

    /// Timeout for artifact downloads, in seconds
    #[arg(long, env = "MYCO_DOWNLOAD_TIMEOUT_SECS", default_value_t = 600)]
    pub download_timeout_secs: u64,
}

impl RuntimeArgs {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

/// The classifier or detector behind `/predict`
#[derive(Args, Debug, Clone)]
pub struct ScoringModelArgs {
    /// Result shape of the scoring model
    #[arg(long, env = "MYCO_MODEL_KIND", value_enum, default_value_t = ModelKind::Classifier)]
    pub model_kind: ModelKind,

    /// ONNX file of the scoring model
    #[arg(long, env = "MYCO_MODEL_PATH", default_value = "models/mushroom_classifier.onnx")]
    pub model_path: PathBuf,

    /// Where to fetch the model from when the file is missing
    #[arg(long, env = "MYCO_MODEL_URL")]
    pub model_url: Option<Url>,

    /// Expected SHA-256 of the model file (hex)
    #[arg(long, env = "MYCO_MODEL_SHA256")]
    pub model_sha256: Option<String>,

    /// Smallest acceptable model file, in bytes
    #[arg(long, env = "MYCO_MODEL_MIN_BYTES", default_value_t = DEFAULT_MIN_BYTES)]
    pub model_min_bytes: u64,

    /// One label per line, in model output order (built-in mushroom table if unset)
    #[arg(long, env = "MYCO_LABELS_FILE")]
    pub labels_file: Option<PathBuf>,

    /// Model input width (default depends on model kind)
    #[arg(long, env = "MYCO_INPUT_WIDTH")]
    pub input_width: Option<u32>,

    /// Model input height (default depends on model kind)
    #[arg(long, env = "MYCO_INPUT_HEIGHT")]
    pub input_height: Option<u32>,

    #[arg(long, env = "MYCO_INPUT_LAYOUT", value_enum)]
    pub input_layout: Option<TensorLayout>,

    #[arg(long, env = "MYCO_COLOR_ORDER", value_enum)]
    pub color_order: Option<ColorOrder>,

    #[arg(long, env = "MYCO_NORMALIZATION", value_enum)]
    pub normalization: Option<Normalization>,

    /// Coordinate system of detector boxes
    #[arg(long, env = "MYCO_DETECTOR_COORDINATES", value_enum, default_value_t = CoordinateSpace::Tensor)]
    pub detector_coordinates: CoordinateSpace,

    /// Classes reported per classification
    #[arg(long, env = "MYCO_TOP_K", default_value_t = DEFAULT_TOP_K)]
    pub top_k: usize,

    /// Detections below this confidence are dropped
    #[arg(long, env = "MYCO_MIN_CONFIDENCE", default_value_t = DEFAULT_MIN_CONFIDENCE)]
    pub min_confidence: f32,
}

impl ScoringModelArgs {
    pub fn handle_name(&self) -> &'static str {
        match self.model_kind {
            ModelKind::Classifier => "classifier",
            ModelKind::Detector => "detector",
        }
    }

    pub fn artifact(&self) -> ArtifactConfig {
        ArtifactConfig::new(&self.model_path)
            .with_url(self.model_url.clone())
            .with_min_bytes(self.model_min_bytes)
            .with_sha256(self.model_sha256.clone())
    }

    /// Per-kind default with any configured overrides applied
    pub fn input_spec(&self) -> InputSpec {
        let defaults = InferenceSettings::for_kind(self.model_kind).input;
        InputSpec {
            width: self.input_width.unwrap_or(defaults.width),
            height: self.input_height.unwrap_or(defaults.height),
            layout: self.input_layout.unwrap_or(defaults.layout),
            color_order: self.color_order.unwrap_or(defaults.color_order),
            normalization: self.normalization.unwrap_or(defaults.normalization),
        }
    }

    pub fn settings(&self) -> InferenceSettings {
        InferenceSettings {
            input: self.input_spec(),
            top_k: self.top_k,
            min_confidence: self.min_confidence,
        }
    }

    pub fn class_table(&self) -> Result<ClassTable> {
        match &self.labels_file {
            Some(path) => ClassTable::from_file(path),
            None => Ok(ClassTable::mushroom()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            anyhow::bail!("--top-k must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            anyhow::bail!(
                "--min-confidence must be within [0, 1], got {}",
                self.min_confidence
            );
        }
        let spec = self.input_spec();
        if spec.width == 0 || spec.height == 0 {
            anyhow::bail!("Model input dimensions must be non-zero");
        }
        Ok(())
    }
}

/// The text generator behind `/generate`
#[derive(Args, Debug, Clone)]
pub struct GeneratorArgs {
    /// ONNX decoder graph (GPT-2 style, no past key values)
    #[arg(long, env = "MYCO_GENERATOR_MODEL_PATH", default_value = "models/gpt2/decoder_model.onnx")]
    pub generator_model_path: PathBuf,

    #[arg(long, env = "MYCO_GENERATOR_MODEL_URL")]
    pub generator_model_url: Option<Url>,

    #[arg(long, env = "MYCO_GENERATOR_MODEL_SHA256")]
    pub generator_model_sha256: Option<String>,

    /// HuggingFace `tokenizer.json` matching the decoder
    #[arg(long, env = "MYCO_TOKENIZER_PATH", default_value = "models/gpt2/tokenizer.json")]
    pub tokenizer_path: PathBuf,

    #[arg(long, env = "MYCO_TOKENIZER_URL")]
    pub tokenizer_url: Option<Url>,

    /// Total tokens per generation, prompt included
    #[arg(long, env = "MYCO_MAX_LENGTH", default_value_t = DEFAULT_MAX_LENGTH)]
    pub max_length: usize,

    #[arg(long, env = "MYCO_TEMPERATURE", default_value_t = 1.0)]
    pub temperature: f32,

    /// Candidates kept when sampling (0 keeps all)
    #[arg(long, env = "MYCO_SAMPLING_TOP_K", default_value_t = 50)]
    pub sampling_top_k: usize,

    /// Always take the most likely token
    #[arg(long, env = "MYCO_GREEDY")]
    pub greedy: bool,

    /// Fixed sampling seed
    #[arg(long, env = "MYCO_SEED")]
    pub seed: Option<u64>,

    /// Return only the continuation, without the prompt
    #[arg(long, env = "MYCO_STRIP_PROMPT")]
    pub strip_prompt: bool,
}

impl GeneratorArgs {
    /// Decoder graph first, tokenizer second
    pub fn artifacts(&self) -> Vec<ArtifactConfig> {
        vec![
            ArtifactConfig::new(&self.generator_model_path)
                .with_url(self.generator_model_url.clone())
                .with_sha256(self.generator_model_sha256.clone()),
            ArtifactConfig::new(&self.tokenizer_path).with_url(self.tokenizer_url.clone()),
        ]
    }

    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            max_length: self.max_length,
            temperature: self.temperature,
            top_k: self.sampling_top_k,
            do_sample: !self.greedy,
            seed: self.seed,
            return_full_text: !self.strip_prompt,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            anyhow::bail!("--max-length must be at least 1");
        }
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            anyhow::bail!("--temperature must be a non-negative number");
        }
        Ok(())
    }
}
