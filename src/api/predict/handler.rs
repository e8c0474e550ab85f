// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Prediction endpoint handler

use axum::{extract::State, Json};
use axum_extra::extract::multipart::{Multipart, MultipartRejection};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::api::errors::ApiError;
use crate::api::http_server::AppState;
use crate::inference::Prediction;
use crate::vision::decode_image_bytes;

/// Multipart field carrying the image
pub const UPLOAD_FIELD: &str = "file";

/// POST /predict - Classify or detect on an uploaded image
///
/// Accepts `multipart/form-data` with the image bytes in the `file` field.
/// The response shape depends on the configured model kind:
/// `{"predictions": [...]}` or `{"detections": [...]}`.
///
/// # Errors
/// - 400 Missing `file` field, unreadable multipart body, or undecodable image
/// - 503 Model never became ready
/// - 500 Inference failed
pub async fn predict_handler(
    State(state): State<Arc<AppState>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Rejected /predict body: {}", rejection);
        ApiError::InvalidRequest(rejection.to_string())
    })?;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        warn!("Malformed multipart body: {}", e);
        ApiError::InvalidRequest(format!("Malformed multipart body: {}", e))
    })? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(|e| {
                ApiError::InvalidRequest(format!("Failed to read upload: {}", e))
            })?;
            upload = Some(bytes);
            break;
        }
    }

    let bytes = upload.ok_or_else(|| {
        ApiError::InvalidRequest(format!("No '{}' field in upload", UPLOAD_FIELD))
    })?;

    let started = Instant::now();
    let image = decode_image_bytes(&bytes).map_err(|e| {
        warn!("Failed to decode upload: {}", e);
        ApiError::from(e)
    })?;
    debug!(
        "Decoded upload: {}x{}x{}, {} bytes",
        image.width(),
        image.height(),
        image.channels(),
        bytes.len()
    );

    let prediction = state.inference.predict(&image).await?;

    info!(
        "Prediction with '{}' complete in {:?}",
        state.inference.name(),
        started.elapsed()
    );
    Ok(Json(prediction))
}
