// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Scoring backend seam
//!
//! A backend is whatever turns a [`PreparedTensor`] into raw numbers: an ONNX
//! session in production, a fake in tests. Backends are not assumed to be
//! reentrant; the service only ever calls them through its gate.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::vision::PreparedTensor;

/// Which result shape a scoring model produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Classifier,
    Detector,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Classifier => write!(f, "classifier"),
            ModelKind::Detector => write!(f, "detector"),
        }
    }
}

/// Coordinate system of raw detection boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSpace {
    /// Pixels of the image the caller uploaded
    Original,
    /// Pixels of the resized model input
    Tensor,
}

/// One unfiltered box as emitted by a detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_index: usize,
    pub confidence: f32,
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl RawDetection {
    /// Scale x coordinates by `sx` and y coordinates by `sy`
    pub fn scaled(self, sx: f32, sy: f32) -> Self {
        Self {
            xmin: self.xmin * sx,
            xmax: self.xmax * sx,
            ymin: self.ymin * sy,
            ymax: self.ymax * sy,
            ..self
        }
    }
}

/// What a backend hands back before formatting
#[derive(Debug, Clone, PartialEq)]
pub enum RawOutput {
    /// Dense per-class scores, index-aligned with the class table
    Scores(Vec<f32>),
    /// Boxes in backend emission order
    Detections {
        detections: Vec<RawDetection>,
        space: CoordinateSpace,
    },
}

impl RawOutput {
    pub fn kind(&self) -> ModelKind {
        match self {
            RawOutput::Scores(_) => ModelKind::Classifier,
            RawOutput::Detections { .. } => ModelKind::Detector,
        }
    }
}

/// A loaded classifier or detector
pub trait ScoringBackend: Send {
    fn kind(&self) -> ModelKind;

    /// Blocking call. Never invoked concurrently on the same instance.
    fn score(&mut self, input: &PreparedTensor) -> Result<RawOutput>;
}
