// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime scoring backends
//!
//! - [`OnnxClassifier`]: one input image tensor, one `[1, C]` score output.
//!   The Keras export of the mushroom model expects 256x256 NHWC RGB with raw
//!   0-255 values (see `InputSpec::classifier_default`).
//! - [`OnnxDetector`]: YOLO-style export with NMS inside the graph. Output
//!   rows are `[x1, y1, x2, y2, score, class]`, shape `[N, 6]` or `[1, N, 6]`,
//!   coordinates in model-input pixels by default (see
//!   `InputSpec::detector_default`).
//!
//! Sessions run on CPU only.

use anyhow::{Context, Result};
use ndarray::ArrayViewD;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use tracing::{debug, info};

use super::backend::{CoordinateSpace, ModelKind, RawDetection, RawOutput, ScoringBackend};
use crate::vision::PreparedTensor;

/// Build a CPU session with full graph optimization
pub(crate) fn open_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model not found: {}", model_path.display());
    }

    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .context(format!(
            "Failed to load ONNX model from {}",
            model_path.display()
        ))?;

    if let Some(input) = session.inputs.first() {
        debug!("Model input '{}': {:?}", input.name, input.input_type);
    }

    Ok(session)
}

fn first_input_name(session: &Session, fallback: &str) -> String {
    session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .unwrap_or_else(|| fallback.to_string())
}

/// Image classifier producing one score per class
pub struct OnnxClassifier {
    session: Session,
    input_name: String,
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OnnxClassifier {
    pub fn open<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();
        info!("Loading ONNX classifier from {}", model_path.display());

        let session = open_session(model_path, intra_threads)?;
        let input_name = first_input_name(&session, "input_1");

        info!("✅ ONNX classifier loaded (input: {})", input_name);
        Ok(Self {
            session,
            input_name,
        })
    }
}

impl ScoringBackend for OnnxClassifier {
    fn kind(&self) -> ModelKind {
        ModelKind::Classifier
    }

    fn score(&mut self, input: &PreparedTensor) -> Result<RawOutput> {
        let input_value = Value::from_array(input.tensor().to_owned())
            .context("Failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Classifier inference failed")?;

        let scores = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract score tensor")?;

        let shape = scores.shape().to_vec();
        match shape.as_slice() {
            [_] | [1, _] => Ok(RawOutput::Scores(scores.iter().copied().collect())),
            other => anyhow::bail!("Unexpected classifier output shape: {:?}", other),
        }
    }
}

/// Object detector with NMS baked into the graph
pub struct OnnxDetector {
    session: Session,
    input_name: String,
    space: CoordinateSpace,
}

impl std::fmt::Debug for OnnxDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxDetector")
            .field("input_name", &self.input_name)
            .field("space", &self.space)
            .finish_non_exhaustive()
    }
}

impl OnnxDetector {
    pub fn open<P: AsRef<Path>>(model_path: P, intra_threads: usize) -> Result<Self> {
        let model_path = model_path.as_ref();
        info!("Loading ONNX detector from {}", model_path.display());

        let session = open_session(model_path, intra_threads)?;
        let input_name = first_input_name(&session, "images");

        info!("✅ ONNX detector loaded (input: {})", input_name);
        Ok(Self {
            session,
            input_name,
            space: CoordinateSpace::Tensor,
        })
    }

    /// Coordinate system the exported graph emits boxes in
    pub fn with_coordinate_space(mut self, space: CoordinateSpace) -> Self {
        self.space = space;
        self
    }
}

/// Parse `[N, 6]` / `[1, N, 6]` rows of `[x1, y1, x2, y2, score, class]`
pub(crate) fn parse_detection_rows(output: ArrayViewD<f32>) -> Result<Vec<RawDetection>> {
    let shape = output.shape().to_vec();
    let rows = match shape.as_slice() {
        [n, 6] | [1, n, 6] => *n,
        [0] | [1, 0] => 0,
        other => anyhow::bail!("Unexpected detector output shape: {:?}", other),
    };

    let flat: Vec<f32> = output.iter().copied().collect();
    let mut detections = Vec::with_capacity(rows);
    for row in flat.chunks_exact(6) {
        let class = row[5];
        if !class.is_finite() || class < 0.0 {
            anyhow::bail!("Detector emitted invalid class id {}", class);
        }
        detections.push(RawDetection {
            class_index: class.round() as usize,
            confidence: row[4],
            xmin: row[0],
            ymin: row[1],
            xmax: row[2],
            ymax: row[3],
        });
    }
    Ok(detections)
}

impl ScoringBackend for OnnxDetector {
    fn kind(&self) -> ModelKind {
        ModelKind::Detector
    }

    fn score(&mut self, input: &PreparedTensor) -> Result<RawOutput> {
        let input_value = Value::from_array(input.tensor().to_owned())
            .context("Failed to create input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .context("Detector inference failed")?;

        let boxes = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract detection tensor")?;

        let detections = parse_detection_rows(boxes.view())?;
        debug!("Detector emitted {} boxes", detections.len());

        Ok(RawOutput::Detections {
            detections,
            space: self.space,
        })
    }
}
