// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::{DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::generate::generate_handler;
use super::predict::predict_handler;
use crate::assessment::{AssessmentGenerator, GenerationConfig};
use crate::inference::{
    InferenceService, InferenceSettings, ModelHandle, ModelKind, ModelStatus,
};
use crate::models::ClassTable;
use crate::vision::MAX_IMAGE_SIZE;

/// Liveness reply, independent of model state
pub const PING_RESPONSE: &str = "Hello, I am alive";

/// Room for multipart framing on top of the image itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Both gated models, shared by every request
#[derive(Debug)]
pub struct AppState {
    pub inference: Arc<InferenceService>,
    pub generator: Arc<AssessmentGenerator>,
}

impl AppState {
    pub fn new(inference: Arc<InferenceService>, generator: Arc<AssessmentGenerator>) -> Self {
        Self {
            inference,
            generator,
        }
    }

    /// Router state with both models unloaded
    pub fn new_for_test() -> Self {
        let kind = ModelKind::Classifier;
        Self {
            inference: Arc::new(InferenceService::new(
                ModelHandle::new("classifier"),
                kind,
                ClassTable::mushroom(),
                InferenceSettings::for_kind(kind),
            )),
            generator: Arc::new(AssessmentGenerator::new(
                ModelHandle::new("generator"),
                GenerationConfig::default(),
            )),
        }
    }

    pub fn model_statuses(&self) -> Vec<ModelStatus> {
        vec![self.inference.status(), self.generator.status()]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: &'static str,
    pub models: Vec<ModelStatus>,
}

pub fn create_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ping", get(ping_handler))
        .route("/health", get(health_handler))
        .route("/predict", post(predict_handler))
        .route("/generate", post(generate_handler))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_SIZE + MULTIPART_OVERHEAD))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn start_server<F>(state: Arc<AppState>, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("API server stopped");
    Ok(())
}

async fn ping_handler() -> &'static str {
    PING_RESPONSE
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let models = state.model_statuses();
    let status = if models.iter().all(|m| m.state.is_ready()) {
        HealthStatus::Ok
    } else {
        HealthStatus::Degraded
    };
    Json(HealthResponse {
        status,
        version: crate::version::VERSION,
        models,
    })
}
