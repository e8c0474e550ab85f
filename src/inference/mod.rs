// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Export all submodules and their public types
pub mod backend;
pub mod format;
pub mod gate;
pub mod handle;
pub mod onnx;
pub mod service;

pub use backend::{CoordinateSpace, ModelKind, RawDetection, RawOutput, ScoringBackend};
pub use format::{
    filter_detections, rescale_detections, top_k, BoundingBox, ClassScore, ClassificationResult,
    Detection, DetectionResult, FormatError,
};
pub use gate::{Gate, GateError};
pub use handle::{ModelHandle, ModelLoadError, ModelState};
pub use onnx::{OnnxClassifier, OnnxDetector};
pub use service::{
    InferenceError, InferenceService, InferenceSettings, ModelStatus, Prediction,
    DEFAULT_MIN_CONFIDENCE, DEFAULT_TOP_K,
};
