// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model loading at process start
//!
//! Both handles are loaded before the listener is bound. A handle that fails
//! to load is kept in `Failed` so `/ping` and `/health` keep answering and
//! only its routes return 503.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::AppState;
use crate::assessment::{AssessmentGenerator, OnnxTextGenerator, TextGenerator};
use crate::config::{GeneratorArgs, RuntimeArgs, ScoringModelArgs, ServiceConfig};
use crate::inference::{
    InferenceService, ModelHandle, ModelKind, ModelLoadError, OnnxClassifier, OnnxDetector,
    ScoringBackend,
};
use crate::models::ArtifactFetcher;

/// Outcome of loading every configured model
#[derive(Debug)]
pub struct Startup {
    pub state: AppState,
    pub failures: Vec<ModelLoadError>,
}

impl Startup {
    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }
}

fn nth_path(paths: &[PathBuf], index: usize) -> Result<&PathBuf> {
    paths
        .get(index)
        .with_context(|| format!("artifact #{} was not resolved", index))
}

/// Load the classifier or detector. Load failures land in the returned
/// error slot, not in `Err`; `Err` is for configuration mistakes.
pub async fn load_inference_service(
    args: &ScoringModelArgs,
    runtime: &RuntimeArgs,
    fetcher: &ArtifactFetcher,
) -> Result<(InferenceService, Option<ModelLoadError>)> {
    let classes = args.class_table().context("Failed to load class table")?;
    let kind = args.model_kind;
    let coordinates = args.detector_coordinates;
    let threads = runtime.intra_threads;

    let mut handle = ModelHandle::<dyn ScoringBackend>::new(args.handle_name());
    let outcome = handle
        .load(fetcher, &[args.artifact()], move |paths| {
            let path = nth_path(paths, 0)?;
            let backend: Box<dyn ScoringBackend> = match kind {
                ModelKind::Classifier => Box::new(OnnxClassifier::open(path, threads)?),
                ModelKind::Detector => Box::new(
                    OnnxDetector::open(path, threads)?.with_coordinate_space(coordinates),
                ),
            };
            Ok(backend)
        })
        .await;

    let service = InferenceService::new(handle, kind, classes, args.settings());
    Ok((service, outcome.err()))
}

/// Load the text generator (decoder graph + tokenizer)
pub async fn load_generator(
    args: &GeneratorArgs,
    runtime: &RuntimeArgs,
    fetcher: &ArtifactFetcher,
) -> (AssessmentGenerator, Option<ModelLoadError>) {
    let threads = runtime.intra_threads;

    let mut handle = ModelHandle::<dyn TextGenerator>::new("generator");
    let outcome = handle
        .load(fetcher, &args.artifacts(), move |paths| {
            let model = nth_path(paths, 0)?;
            let tokenizer = nth_path(paths, 1)?;
            let backend: Box<dyn TextGenerator> =
                Box::new(OnnxTextGenerator::open(model, tokenizer, threads)?);
            Ok(backend)
        })
        .await;

    (
        AssessmentGenerator::new(handle, args.generation_config()),
        outcome.err(),
    )
}

/// Load everything the server needs
pub async fn build_state(config: &ServiceConfig) -> Result<Startup> {
    config.validate()?;
    let fetcher = ArtifactFetcher::new(config.runtime.download_timeout())?;

    let (inference, scoring_failure) =
        load_inference_service(&config.scoring, &config.runtime, &fetcher).await?;
    let (generator, generator_failure) =
        load_generator(&config.generator, &config.runtime, &fetcher).await;

    let failures: Vec<ModelLoadError> = scoring_failure
        .into_iter()
        .chain(generator_failure)
        .collect();

    if failures.is_empty() {
        info!("✅ All models ready");
    } else {
        for failure in &failures {
            warn!("⚠️  {}", failure);
        }
    }

    Ok(Startup {
        state: AppState::new(Arc::new(inference), Arc::new(generator)),
        failures,
    })
}
