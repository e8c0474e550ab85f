// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use mycoserve::{api::start_server, config::ServiceConfig, startup::build_state};
use std::{env, sync::Arc};
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    dotenv::dotenv().ok();
    let config = ServiceConfig::parse();

    println!("🍄 Starting {}...\n", mycoserve::version::get_version_string());

    // Models load fully before the listener is bound
    let startup = build_state(&config).await?;
    if startup.is_degraded() {
        if config.strict_startup {
            for failure in &startup.failures {
                eprintln!("❌ {}", failure);
            }
            anyhow::bail!("{} model(s) failed to load", startup.failures.len());
        }
        warn!("⚠️  Serving degraded: affected routes answer 503 until restart");
    }

    let addr = config.bind_addr()?;
    start_server(Arc::new(startup.state), addr, shutdown_signal()).await?;

    info!("👋 Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down..."),
        Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
    }
}
