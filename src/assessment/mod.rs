// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Natural-language notes for a prior prediction
//!
//! This module provides:
//! - The fixed grower prompt (`prompt`)
//! - A gated text generator with sampling limits (`generator`)
//! - Logit sampling (`sampling`) and an ONNX GPT-2 backend (`onnx_generator`)

pub mod generator;
pub mod onnx_generator;
pub mod prompt;
pub mod sampling;

pub use generator::{
    Assessment, AssessmentGenerator, GenerationConfig, TextGenerator, DEFAULT_MAX_LENGTH,
};
pub use onnx_generator::OnnxTextGenerator;
pub use prompt::render;

use thiserror::Error;

use crate::inference::{GateError, ModelState};

/// Exact message returned to callers for incomplete `/generate` requests
pub const MISSING_FIELD_MESSAGE: &str = "Missing disease or confidence";

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("Missing disease or confidence")]
    MissingField,
    #[error("Model '{model}' is not ready ({state})")]
    NotReady { model: String, state: ModelState },
    #[error("Generation with '{model}' failed: {message}")]
    Generation { model: String, message: String },
    #[error(transparent)]
    Aborted(#[from] GateError),
}
