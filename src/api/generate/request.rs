// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Assessment request types and validation

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assessment::AssessmentError;

/// Confidence as sent by clients: a JSON number or a numeric string
fn confidence_percent(value: &Value) -> Option<f64> {
    let percent = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse().ok()?,
        _ => return None,
    };
    percent.is_finite().then_some(percent)
}

/// Request for a grower assessment of a prior prediction.
///
/// Fields stay untyped until `validate` so a wrong JSON type gets the same
/// `MissingField` answer as an absent one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub disease: Value,

    /// Percentage, embedded in the prompt as given
    #[serde(default)]
    pub confidence: Value,
}

impl GenerateRequest {
    /// Both fields present and usable, or `MissingField`
    pub fn validate(&self) -> Result<(&str, f64), AssessmentError> {
        let disease = self
            .disease
            .as_str()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .ok_or(AssessmentError::MissingField)?;
        let confidence =
            confidence_percent(&self.confidence).ok_or(AssessmentError::MissingField)?;
        Ok((disease, confidence))
    }
}
