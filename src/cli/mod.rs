// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{GeneratorArgs, RuntimeArgs, ScoringModelArgs};
use crate::models::ArtifactFetcher;
use crate::startup::{load_generator, load_inference_service};
use crate::vision::decode_image_bytes;

/// mycoserve CLI
#[derive(Parser, Debug)]
#[command(name = "myco-cli")]
#[command(version = crate::version::VERSION)]
#[command(about = "Run the mushroom inference pipeline from the command line", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify or detect on a local image and print the JSON result
    Predict(PredictArgs),

    /// Generate a grower assessment for a prediction
    Assess(AssessArgs),

    /// Download and verify every configured model artifact
    Fetch(FetchArgs),
}

/// Arguments for predict command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Image file to analyse
    pub image: PathBuf,

    #[command(flatten)]
    pub scoring: ScoringModelArgs,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

/// Arguments for assess command
#[derive(Args, Debug)]
pub struct AssessArgs {
    /// Predicted disease label
    #[arg(long)]
    pub disease: String,

    /// Confidence percentage
    #[arg(long)]
    pub confidence: f64,

    #[command(flatten)]
    pub generator: GeneratorArgs,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

/// Arguments for fetch command
#[derive(Args, Debug)]
pub struct FetchArgs {
    #[command(flatten)]
    pub scoring: ScoringModelArgs,

    #[command(flatten)]
    pub generator: GeneratorArgs,

    #[command(flatten)]
    pub runtime: RuntimeArgs,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Predict(args) => predict(args).await,
        Commands::Assess(args) => assess(args).await,
        Commands::Fetch(args) => fetch(args).await,
    }
}

async fn predict(args: PredictArgs) -> Result<()> {
    args.scoring.validate()?;
    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?;
    let image = decode_image_bytes(&bytes)?;

    let fetcher = ArtifactFetcher::new(args.runtime.download_timeout())?;
    let (service, failure) = load_inference_service(&args.scoring, &args.runtime, &fetcher).await?;
    if let Some(failure) = failure {
        return Err(failure.into());
    }

    let prediction = service.predict(&image).await?;
    println!("{}", serde_json::to_string_pretty(&prediction)?);
    Ok(())
}

async fn assess(args: AssessArgs) -> Result<()> {
    args.generator.validate()?;

    let fetcher = ArtifactFetcher::new(args.runtime.download_timeout())?;
    let (generator, failure) = load_generator(&args.generator, &args.runtime, &fetcher).await;
    if let Some(failure) = failure {
        return Err(failure.into());
    }

    let assessment = generator.assess(&args.disease, args.confidence).await?;
    println!("{}", assessment.text);
    Ok(())
}

async fn fetch(args: FetchArgs) -> Result<()> {
    let fetcher = ArtifactFetcher::new(args.runtime.download_timeout())?;

    let artifacts = std::iter::once(args.scoring.artifact()).chain(args.generator.artifacts());
    for artifact in artifacts {
        let path = fetcher.ensure(&artifact).await?;
        println!("✅ {}", path.display());
    }
    Ok(())
}
