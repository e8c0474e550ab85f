// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image codec for the inference pipeline
//!
//! This module provides:
//! - Upload decoding and validation (`image_utils`)
//! - Resize, channel order, normalization and tensor layout (`preprocessing`)
//!
//! Everything here is pure and safe to run concurrently across requests.

pub mod image_utils;
pub mod preprocessing;

pub use image_utils::{decode_image_bytes, detect_format, DecodedImage, ImageError, MAX_IMAGE_SIZE};
pub use preprocessing::{
    normalize, resize, to_rgb, with_color_order, ColorOrder, InputSpec, Normalization,
    PreparedTensor, TensorLayout,
};
