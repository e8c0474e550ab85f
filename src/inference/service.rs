// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image in, typed prediction out
//!
//! One [`InferenceService`] wraps one scoring model. Preprocessing and result
//! formatting run on the caller's task; only the backend call goes through
//! the gate.

use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error};

use super::backend::{CoordinateSpace, ModelKind, RawOutput, ScoringBackend};
use super::format::{
    filter_detections, rescale_detections, top_k, ClassificationResult, DetectionResult,
    FormatError,
};
use super::gate::{Gate, GateError};
use super::handle::{ModelHandle, ModelState};
use crate::models::ClassTable;
use crate::vision::{DecodedImage, ImageError, InputSpec, PreparedTensor};

/// Number of classes reported by `/predict` unless configured otherwise
pub const DEFAULT_TOP_K: usize = 2;
/// Detections scoring below this are dropped
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.5;

#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model '{model}' is not ready ({state})")]
    NotReady { model: String, state: ModelState },
    #[error(transparent)]
    Preprocess(#[from] ImageError),
    #[error("Backend failure in '{model}': {message}")]
    Backend { model: String, message: String },
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("Model produced {actual} output, expected {expected}")]
    UnexpectedOutput {
        expected: ModelKind,
        actual: ModelKind,
    },
    #[error(transparent)]
    Aborted(#[from] GateError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceSettings {
    pub input: InputSpec,
    pub top_k: usize,
    pub min_confidence: f32,
}

impl InferenceSettings {
    pub fn for_kind(kind: ModelKind) -> Self {
        let input = match kind {
            ModelKind::Classifier => InputSpec::classifier_default(),
            ModelKind::Detector => InputSpec::detector_default(),
        };
        Self {
            input,
            top_k: DEFAULT_TOP_K,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

/// Either result shape, serialized as-is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Prediction {
    Classification(ClassificationResult),
    Detection(DetectionResult),
}

/// Snapshot for `/health`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub name: String,
    pub kind: String,
    #[serde(flatten)]
    pub state: ModelState,
}

pub struct InferenceService {
    name: String,
    kind: ModelKind,
    state: ModelState,
    classes: ClassTable,
    settings: InferenceSettings,
    gate: Gate<ModelHandle<dyn ScoringBackend>>,
}

impl std::fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceService")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl InferenceService {
    /// Take ownership of a handle that has already been through `load`.
    /// Its state is fixed from here on.
    pub fn new(
        handle: ModelHandle<dyn ScoringBackend>,
        kind: ModelKind,
        classes: ClassTable,
        settings: InferenceSettings,
    ) -> Self {
        let name = handle.name().to_string();
        let state = handle.state().clone();
        Self {
            gate: Gate::new(name.clone(), handle),
            name,
            kind,
            state,
            classes,
            settings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn classes(&self) -> &ClassTable {
        &self.classes
    }

    pub fn settings(&self) -> &InferenceSettings {
        &self.settings
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            name: self.name.clone(),
            kind: self.kind.to_string(),
            state: self.state.clone(),
        }
    }

    /// Run the backend once. Fails fast with `NotReady` instead of queueing.
    pub async fn infer(&self, input: PreparedTensor) -> Result<RawOutput, InferenceError> {
        if !self.state.is_ready() {
            return Err(InferenceError::NotReady {
                model: self.name.clone(),
                state: self.state.clone(),
            });
        }

        let queued_at = Instant::now();
        let result = self
            .gate
            .run(move |handle| -> anyhow::Result<RawOutput> {
                let started = Instant::now();
                let backend = handle
                    .backend_mut()
                    .ok_or_else(|| anyhow::anyhow!("backend missing from ready handle"))?;
                let output = backend.score(&input);
                debug!("backend call took {:?}", started.elapsed());
                output
            })
            .await?;

        debug!(
            model = %self.name,
            "inference finished in {:?} (including queue)",
            queued_at.elapsed()
        );

        result.map_err(|e| {
            let message = format!("{:#}", e);
            error!("❌ Backend '{}' failed: {}", self.name, message);
            InferenceError::Backend {
                model: self.name.clone(),
                message,
            }
        })
    }

    pub async fn classify(
        &self,
        image: &DecodedImage,
    ) -> Result<ClassificationResult, InferenceError> {
        let tensor = self.settings.input.prepare(image)?;
        match self.infer(tensor).await? {
            RawOutput::Scores(scores) => Ok(top_k(&scores, &self.classes, self.settings.top_k)?),
            other => Err(InferenceError::UnexpectedOutput {
                expected: ModelKind::Classifier,
                actual: other.kind(),
            }),
        }
    }

    pub async fn detect(&self, image: &DecodedImage) -> Result<DetectionResult, InferenceError> {
        let tensor = self.settings.input.prepare(image)?;
        let (width, height) = tensor.source_size();
        let tensor_size = tensor.tensor_size();

        match self.infer(tensor).await? {
            RawOutput::Detections { detections, space } => {
                let detections = match space {
                    CoordinateSpace::Original => detections,
                    CoordinateSpace::Tensor => {
                        rescale_detections(detections, tensor_size, (width, height))
                    }
                };
                Ok(filter_detections(
                    &detections,
                    &self.classes,
                    self.settings.min_confidence,
                    width,
                    height,
                )?)
            }
            other => Err(InferenceError::UnexpectedOutput {
                expected: ModelKind::Detector,
                actual: other.kind(),
            }),
        }
    }

    /// Dispatch on the configured model kind
    pub async fn predict(&self, image: &DecodedImage) -> Result<Prediction, InferenceError> {
        match self.kind {
            ModelKind::Classifier => self.classify(image).await.map(Prediction::Classification),
            ModelKind::Detector => self.detect(image).await.map(Prediction::Detection),
        }
    }
}
