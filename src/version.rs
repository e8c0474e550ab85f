// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for mycoserve

/// Semantic version number
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capabilities compiled into this build
pub const FEATURES: &[&str] = &[
    "onnx-classifier",
    "onnx-detector",
    "onnx-gpt2-assessment",
    "artifact-download",
    "sha256-verification",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("mycoserve {} ({})", VERSION, FEATURES.join(", "))
}
