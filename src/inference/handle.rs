// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Loaded-model lifecycle: `Unloaded -> Loading -> Ready | Failed`

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

use crate::models::{ArtifactConfig, ArtifactError, ArtifactFetcher};

/// Lifecycle state of a [`ModelHandle`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ModelState {
    Unloaded,
    Loading,
    Ready,
    /// Terminal until `load` is called again
    Failed(String),
}

impl ModelState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelState::Ready)
    }
}

impl std::fmt::Display for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Unloaded => write!(f, "unloaded"),
            ModelState::Loading => write!(f, "loading"),
            ModelState::Ready => write!(f, "ready"),
            ModelState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Artifact unavailable for '{model}': {source}")]
    ArtifactUnavailable {
        model: String,
        #[source]
        source: ArtifactError,
    },
    #[error("Failed to load '{model}': {message}")]
    Backend { model: String, message: String },
}

/// Exclusive owner of one loaded backend.
///
/// `B` is the capability the backend offers (`dyn ScoringBackend` or
/// `dyn TextGenerator`). A handle is built once at startup and handed to the
/// service that gates it.
pub struct ModelHandle<B: ?Sized> {
    name: String,
    state: ModelState,
    backend: Option<Box<B>>,
}

impl<B: ?Sized> std::fmt::Debug for ModelHandle<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<B: ?Sized> ModelHandle<B> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ModelState::Unloaded,
            backend: None,
        }
    }

    /// Wrap an already-constructed backend (fakes, embedded models)
    pub fn ready(name: impl Into<String>, backend: Box<B>) -> Self {
        Self {
            name: name.into(),
            state: ModelState::Ready,
            backend: Some(backend),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &ModelState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_ready()
    }

    /// Present only in `Ready`
    pub fn backend_mut(&mut self) -> Option<&mut B> {
        match self.state {
            ModelState::Ready => self.backend.as_deref_mut(),
            _ => None,
        }
    }

    /// Make every artifact available, then open the backend from their paths.
    ///
    /// Any failure leaves the handle in `Failed` with no backend. Calling
    /// `load` again starts over from `Loading`.
    pub async fn load<F>(
        &mut self,
        fetcher: &ArtifactFetcher,
        artifacts: &[ArtifactConfig],
        open: F,
    ) -> Result<(), ModelLoadError>
    where
        F: FnOnce(&[PathBuf]) -> anyhow::Result<Box<B>>,
    {
        self.backend = None;
        self.state = ModelState::Loading;
        info!("Loading model '{}'", self.name);

        let mut paths = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            match fetcher.ensure(artifact).await {
                Ok(path) => paths.push(path),
                Err(source) => {
                    error!("❌ Model '{}' artifact unavailable: {}", self.name, source);
                    self.state = ModelState::Failed(source.to_string());
                    return Err(ModelLoadError::ArtifactUnavailable {
                        model: self.name.clone(),
                        source,
                    });
                }
            }
        }

        match open(&paths) {
            Ok(backend) => {
                self.backend = Some(backend);
                self.state = ModelState::Ready;
                info!("✅ Model '{}' ready", self.name);
                Ok(())
            }
            Err(e) => {
                let message = format!("{:#}", e);
                error!("❌ Model '{}' failed to load: {}", self.name, message);
                self.state = ModelState::Failed(message.clone());
                Err(ModelLoadError::Backend {
                    model: self.name.clone(),
                    message,
                })
            }
        }
    }
}
