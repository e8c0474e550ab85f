// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

use crate::assessment::{AssessmentError, MISSING_FIELD_MESSAGE};
use crate::inference::InferenceError;
use crate::vision::ImageError;

/// Body of every non-2xx response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Caller error, message is shown as-is
    InvalidRequest(String),
    /// The model behind the route never became ready
    ServiceUnavailable(String),
    /// Backend or configuration fault; details stay in the logs
    InternalError(String),
}

impl ApiError {
    pub fn to_response(&self) -> ErrorResponse {
        let message = match self {
            ApiError::InvalidRequest(msg)
            | ApiError::ServiceUnavailable(msg)
            | ApiError::InternalError(msg) => msg.clone(),
        };
        ErrorResponse { error: message }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::InvalidRequest(_) => 400,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::InternalError(_) => 500,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_response())).into_response()
    }
}

impl From<ImageError> for ApiError {
    fn from(e: ImageError) -> Self {
        ApiError::InvalidRequest(format!("Invalid image: {}", e))
    }
}

impl From<InferenceError> for ApiError {
    fn from(e: InferenceError) -> Self {
        match e {
            InferenceError::Preprocess(e) => e.into(),
            InferenceError::NotReady { model, .. } => {
                ApiError::ServiceUnavailable(format!("Model '{}' is not available", model))
            }
            // already logged with full context by the service
            InferenceError::Backend { .. } => {
                ApiError::InternalError("Inference failed".to_string())
            }
            InferenceError::Format(e) => {
                error!("❌ Label table does not match model output: {}", e);
                ApiError::InternalError("Inference failed".to_string())
            }
            other => {
                error!("❌ Inference failed: {}", other);
                ApiError::InternalError("Inference failed".to_string())
            }
        }
    }
}

impl From<AssessmentError> for ApiError {
    fn from(e: AssessmentError) -> Self {
        match e {
            AssessmentError::MissingField => {
                ApiError::InvalidRequest(MISSING_FIELD_MESSAGE.to_string())
            }
            AssessmentError::NotReady { model, .. } => {
                ApiError::ServiceUnavailable(format!("Model '{}' is not available", model))
            }
            AssessmentError::Generation { .. } => {
                ApiError::InternalError("Generation failed".to_string())
            }
            other => {
                error!("❌ Generation failed: {}", other);
                ApiError::InternalError("Generation failed".to_string())
            }
        }
    }
}
