// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Assessment endpoint handler

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::request::GenerateRequest;
use super::response::GenerateResponse;
use crate::api::errors::ApiError;
use crate::api::http_server::AppState;

/// POST /generate - Write a short grower note for a prior prediction
///
/// # Request
/// - `disease`: Predicted label (required, non-blank)
/// - `confidence`: Confidence percentage (required, number or numeric string)
///
/// # Errors
/// - 400 `{"error": "Missing disease or confidence"}`
/// - 503 Generator never became ready
/// - 500 Generation failed
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected /generate body: {}", rejection.body_text());
        ApiError::InvalidRequest(rejection.body_text())
    })?;

    let (disease, confidence) = request.validate()?;
    debug!("Assessment requested for '{}' at {}%", disease, confidence);

    let assessment = state.generator.assess(disease, confidence).await?;
    info!(
        "Assessment for '{}' generated ({} chars)",
        assessment.disease,
        assessment.text.len()
    );

    Ok(Json(GenerateResponse {
        assessment: assessment.text,
    }))
}
