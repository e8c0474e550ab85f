// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod assessment;
pub mod cli;
pub mod config;
pub mod inference;
pub mod models;
pub mod startup;
pub mod version;
pub mod vision;

// Re-export main types
pub use assessment::{Assessment, AssessmentError, AssessmentGenerator, GenerationConfig};
pub use inference::{
    ClassificationResult, DetectionResult, InferenceError, InferenceService, ModelHandle,
    ModelKind, ModelState, Prediction,
};
pub use models::{ArtifactConfig, ArtifactError, ArtifactFetcher, ClassTable};
pub use vision::{decode_image_bytes, DecodedImage, ImageError, InputSpec, PreparedTensor};
