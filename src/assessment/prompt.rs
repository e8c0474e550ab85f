// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! The grower-facing prompt

use super::AssessmentError;

/// Fill in the fixed agricultural-scientist prompt.
///
/// Both values are embedded verbatim. A blank disease or a non-finite
/// confidence is a `MissingField`; zero is a valid confidence.
pub fn render(disease: &str, confidence_percent: f64) -> Result<String, AssessmentError> {
    if disease.trim().is_empty() || !confidence_percent.is_finite() {
        return Err(AssessmentError::MissingField);
    }

    Ok(format!(
        "You are an expert agricultural scientist.\n\
         Given the following prediction:\n\
         Disease: {disease}\n\
         Confidence: {confidence_percent}%\n\
         \n\
         Write a short, 3-5 sentence analysis explaining the meaning of the result \
         and suggest actions for the mushroom grower.\n\
         Keep it simple, clear, and reassuring.\n"
    ))
}
