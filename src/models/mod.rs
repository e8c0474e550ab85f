// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model artifacts on disk and the label tables that go with them

pub mod artifact;
pub mod labels;

pub use artifact::{verify_file, ArtifactConfig, ArtifactError, ArtifactFetcher, DEFAULT_MIN_BYTES};
pub use labels::{ClassTable, MUSHROOM_CLASSES};
