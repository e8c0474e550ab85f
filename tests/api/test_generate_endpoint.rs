// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use mycoserve::api::{create_app, AppState};
use mycoserve::assessment::{AssessmentGenerator, GenerationConfig, TextGenerator};
use mycoserve::inference::{InferenceService, InferenceSettings, ModelHandle, ModelKind};
use mycoserve::models::ClassTable;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

/// Echoes a canned continuation and records every prompt it saw
struct Canned {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl TextGenerator for Canned {
    fn generate(&mut self, prompt: &str, _config: &GenerationConfig) -> anyhow::Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(format!("{}Keep humidity steady.", prompt))
    }
}

fn state_with_generator(prompts: Arc<Mutex<Vec<String>>>) -> Arc<AppState> {
    let kind = ModelKind::Classifier;
    let inference = InferenceService::new(
        ModelHandle::new("classifier"),
        kind,
        ClassTable::mushroom(),
        InferenceSettings::for_kind(kind),
    );
    let backend = Box::new(Canned { prompts }) as Box<dyn TextGenerator>;
    let generator = AssessmentGenerator::new(
        ModelHandle::ready("generator", backend),
        GenerationConfig::default(),
    );
    Arc::new(AppState::new(Arc::new(inference), Arc::new(generator)))
}

async fn post_json(state: Arc<AppState>, body: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = create_app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_generate_returns_assessment() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let state = state_with_generator(prompts.clone());

    let (status, body) = post_json(state, r#"{"disease":"Wilt","confidence":92.5}"#).await;

    assert_eq!(status, StatusCode::OK);
    let text = body["assessment"].as_str().unwrap();
    assert!(text.contains("Disease: Wilt"));
    assert!(text.ends_with("Keep humidity steady."));

    let prompts = prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Confidence: 92.5%"));
}

#[tokio::test]
async fn test_generate_accepts_numeric_string_confidence() {
    let prompts = Arc::new(Mutex::new(Vec::new()));
    let state = state_with_generator(prompts.clone());

    let (status, _) = post_json(state, r#"{"disease":"Dry Bubble","confidence":"80"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert!(prompts.lock().unwrap()[0].contains("Confidence: 80%"));
}

#[tokio::test]
async fn test_generate_missing_fields_is_400() {
    let cases = [
        r#"{}"#,
        r#"{"disease":"Wilt"}"#,
        r#"{"confidence":50}"#,
        r#"{"disease":"   ","confidence":50}"#,
        r#"{"disease":"Wilt","confidence":"lots"}"#,
        r#"{"disease":5,"confidence":90}"#,
        r#"{"disease":"Wilt","confidence":true}"#,
        r#"{"disease":{"name":"Wilt"},"confidence":[90]}"#,
    ];

    for case in cases {
        let prompts = Arc::new(Mutex::new(Vec::new()));
        let (status, body) = post_json(state_with_generator(prompts.clone()), case).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "case {}", case);
        assert_eq!(body, json!({"error": "Missing disease or confidence"}));
        assert!(prompts.lock().unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_generate_malformed_json_is_400() {
    let prompts = Arc::new(Mutex::new(Vec::new()));

    let (status, body) = post_json(state_with_generator(prompts), "{not json").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_generate_unloaded_model_is_503() {
    let state = Arc::new(AppState::new_for_test());

    let (status, body) = post_json(state, r#"{"disease":"Wilt","confidence":70}"#).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("generator"));
}

#[tokio::test]
async fn test_generate_validation_precedes_readiness() {
    let state = Arc::new(AppState::new_for_test());

    let (status, body) = post_json(state, r#"{"disease":"Wilt"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing disease or confidence");
}
