// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Gated text generation for grower assessments

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{error, info};

use super::{render, AssessmentError};
use crate::inference::{Gate, ModelHandle, ModelState, ModelStatus};

/// Default generation cap in tokens, prompt included
pub const DEFAULT_MAX_LENGTH: usize = 200;

/// A loaded causal language model
pub trait TextGenerator: Send {
    /// Blocking call. Never invoked concurrently on the same instance.
    fn generate(&mut self, prompt: &str, config: &GenerationConfig) -> anyhow::Result<String>;
}

/// Sampling parameters applied to every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Total sequence length cap (prompt + continuation) in tokens
    pub max_length: usize,
    pub temperature: f32,
    /// Candidates kept before sampling; 0 keeps all
    pub top_k: usize,
    pub do_sample: bool,
    /// Fixed seed for reproducible output
    pub seed: Option<u64>,
    /// Prepend the prompt to the returned text
    pub return_full_text: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_length: DEFAULT_MAX_LENGTH,
            temperature: 1.0,
            top_k: 50,
            do_sample: true,
            seed: None,
            return_full_text: true,
        }
    }
}

/// One generated note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub disease: String,
    pub confidence_percent: f64,
    pub text: String,
}

pub struct AssessmentGenerator {
    name: String,
    state: ModelState,
    config: GenerationConfig,
    gate: Gate<ModelHandle<dyn TextGenerator>>,
}

impl std::fmt::Debug for AssessmentGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssessmentGenerator")
            .field("name", &self.name)
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AssessmentGenerator {
    pub fn new(handle: ModelHandle<dyn TextGenerator>, config: GenerationConfig) -> Self {
        let name = handle.name().to_string();
        let state = handle.state().clone();
        Self {
            gate: Gate::new(name.clone(), handle),
            name,
            state,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub fn status(&self) -> ModelStatus {
        ModelStatus {
            name: self.name.clone(),
            kind: "generator".to_string(),
            state: self.state.clone(),
        }
    }

    /// Run the backend on `prompt` through the gate
    pub async fn generate(&self, prompt: String) -> Result<String, AssessmentError> {
        if !self.state.is_ready() {
            return Err(AssessmentError::NotReady {
                model: self.name.clone(),
                state: self.state.clone(),
            });
        }

        let config = self.config.clone();
        let started = Instant::now();
        let result = self
            .gate
            .run(move |handle| -> anyhow::Result<String> {
                let backend = handle
                    .backend_mut()
                    .ok_or_else(|| anyhow::anyhow!("backend missing from ready handle"))?;
                backend.generate(&prompt, &config)
            })
            .await?;

        match result {
            Ok(text) => {
                info!(
                    "Generated {} chars with '{}' in {:?}",
                    text.len(),
                    self.name,
                    started.elapsed()
                );
                Ok(text)
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("❌ Generation with '{}' failed: {}", self.name, message);
                Err(AssessmentError::Generation {
                    model: self.name.clone(),
                    message,
                })
            }
        }
    }

    /// Render the prompt for a prior prediction and generate the note
    pub async fn assess(
        &self,
        disease: &str,
        confidence_percent: f64,
    ) -> Result<Assessment, AssessmentError> {
        let prompt = render(disease, confidence_percent)?;
        let text = self.generate(prompt).await?;
        Ok(Assessment {
            disease: disease.to_string(),
            confidence_percent,
            text,
        })
    }
}
