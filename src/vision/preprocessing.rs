// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image preprocessing: resize, channel handling and tensor construction

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage, RgbaImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::image_utils::{DecodedImage, ImageError};

/// Interpolation used for every resize. Bilinear, deterministic.
pub const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// How sample values are mapped into the tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// 0-255 passed through as f32
    RawUint8,
    /// every sample divided by 255.0
    UnitFloat,
}

/// Channel order a model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ColorOrder {
    Rgb,
    Bgr,
}

/// Tensor memory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TensorLayout {
    /// [1, H, W, C] (Keras / TensorFlow exports)
    Nhwc,
    /// [1, C, H, W] (PyTorch exports)
    Nchw,
}

/// A model-ready tensor plus the geometry needed to map outputs back onto the
/// caller's image.
#[derive(Debug, Clone)]
pub struct PreparedTensor {
    tensor: Array4<f32>,
    layout: TensorLayout,
    source_width: u32,
    source_height: u32,
}

impl PreparedTensor {
    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn tensor(&self) -> &Array4<f32> {
        &self.tensor
    }

    /// Flat values in the tensor's logical order
    pub fn values(&self) -> Vec<f32> {
        self.tensor.iter().copied().collect()
    }

    /// Dimensions of the image before resize
    pub fn source_size(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    /// Spatial (width, height) of the tensor itself
    pub fn tensor_size(&self) -> (u32, u32) {
        let s = self.tensor.shape();
        match self.layout {
            TensorLayout::Nhwc => (s[2] as u32, s[1] as u32),
            TensorLayout::Nchw => (s[3] as u32, s[2] as u32),
        }
    }

    /// Re-lay the tensor as NCHW. No-op when it already is.
    pub fn to_nchw(self) -> Self {
        match self.layout {
            TensorLayout::Nchw => self,
            TensorLayout::Nhwc => Self {
                tensor: self.tensor.permuted_axes([0, 3, 1, 2]).as_standard_layout().to_owned(),
                layout: TensorLayout::Nchw,
                ..self
            },
        }
    }

    pub(crate) fn with_source_size(mut self, width: u32, height: u32) -> Self {
        self.source_width = width;
        self.source_height = height;
        self
    }
}

/// Resize to exactly `target_width` x `target_height` with [`RESIZE_FILTER`].
pub fn resize(
    image: &DecodedImage,
    target_width: u32,
    target_height: u32,
) -> Result<DecodedImage, ImageError> {
    if target_width == 0 || target_height == 0 {
        return Err(ImageError::InvalidDimensions {
            width: target_width,
            height: target_height,
            channels: image.channels(),
        });
    }

    if image.width() == target_width && image.height() == target_height {
        return Ok(image.clone());
    }

    let (w, h) = (image.width(), image.height());
    let samples = image.samples().to_vec();
    let corrupt = || ImageError::DecodeFailed("sample buffer does not match dimensions".into());

    let resized = match image.channels() {
        1 => {
            let buf = GrayImage::from_raw(w, h, samples).ok_or_else(corrupt)?;
            imageops::resize(&buf, target_width, target_height, RESIZE_FILTER).into_raw()
        }
        3 => {
            let buf = RgbImage::from_raw(w, h, samples).ok_or_else(corrupt)?;
            imageops::resize(&buf, target_width, target_height, RESIZE_FILTER).into_raw()
        }
        _ => {
            let buf = RgbaImage::from_raw(w, h, samples).ok_or_else(corrupt)?;
            imageops::resize(&buf, target_width, target_height, RESIZE_FILTER).into_raw()
        }
    };

    DecodedImage::new(target_width, target_height, image.channels(), resized)
}

/// Expand greyscale or drop alpha so the image has exactly three channels
pub fn to_rgb(image: &DecodedImage) -> DecodedImage {
    let samples = match image.channels() {
        3 => return image.clone(),
        1 => image.samples().iter().flat_map(|&v| [v, v, v]).collect(),
        _ => image
            .samples()
            .chunks_exact(4)
            .flat_map(|px| [px[0], px[1], px[2]])
            .collect(),
    };
    DecodedImage::from_parts(image.width(), image.height(), 3, samples)
}

/// Permute the channel axis into `order`. Input is assumed to be RGB(A);
/// single-channel images are returned unchanged.
pub fn with_color_order(image: &DecodedImage, order: ColorOrder) -> DecodedImage {
    if order == ColorOrder::Rgb || image.channels() < 3 {
        return image.clone();
    }

    let channels = image.channels() as usize;
    let mut samples = image.samples().to_vec();
    for px in samples.chunks_exact_mut(channels) {
        px.swap(0, 2);
    }
    DecodedImage::from_parts(image.width(), image.height(), image.channels(), samples)
}

/// Turn samples into an NHWC `[1, H, W, C]` tensor
pub fn normalize(image: &DecodedImage, mode: Normalization) -> PreparedTensor {
    let (w, h, c) = (
        image.width() as usize,
        image.height() as usize,
        image.channels() as usize,
    );
    let scale = match mode {
        Normalization::RawUint8 => 1.0,
        Normalization::UnitFloat => 1.0 / 255.0,
    };

    let samples = image.samples();
    let tensor = Array4::from_shape_fn((1, h, w, c), |(_, y, x, ch)| {
        samples[(y * w + x) * c + ch] as f32 * scale
    });

    PreparedTensor {
        tensor,
        layout: TensorLayout::Nhwc,
        source_width: image.width(),
        source_height: image.height(),
    }
}

/// Everything a backend needs to receive its input in the right shape.
///
/// Mismatching `color_order` degrades accuracy silently rather than failing,
/// so each backend documents the input it expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpec {
    pub width: u32,
    pub height: u32,
    pub layout: TensorLayout,
    pub color_order: ColorOrder,
    pub normalization: Normalization,
}

impl InputSpec {
    /// Keras classifier export: 256x256 RGB NHWC, raw 0-255 (rescaling is
    /// part of the graph)
    pub fn classifier_default() -> Self {
        Self {
            width: 256,
            height: 256,
            layout: TensorLayout::Nhwc,
            color_order: ColorOrder::Rgb,
            normalization: Normalization::RawUint8,
        }
    }

    /// YOLO-style detector export: 640x640 RGB NCHW, 0.0-1.0
    pub fn detector_default() -> Self {
        Self {
            width: 640,
            height: 640,
            layout: TensorLayout::Nchw,
            color_order: ColorOrder::Rgb,
            normalization: Normalization::UnitFloat,
        }
    }

    /// Full pipeline: RGB conversion, resize, channel order, normalization,
    /// layout. Remembers the original image size.
    pub fn prepare(&self, image: &DecodedImage) -> Result<PreparedTensor, ImageError> {
        let rgb = to_rgb(image);
        let resized = resize(&rgb, self.width, self.height)?;
        let ordered = with_color_order(&resized, self.color_order);
        let tensor = normalize(&ordered, self.normalization)
            .with_source_size(image.width(), image.height());

        Ok(match self.layout {
            TensorLayout::Nhwc => tensor,
            TensorLayout::Nchw => tensor.to_nchw(),
        })
    }
}
