// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use mycoserve::api::{create_app, AppState, PING_RESPONSE};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
    let app = create_app(Arc::new(AppState::new_for_test()));
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_ping_answers_without_models() {
    let (status, body) = get("/ping").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).unwrap(), PING_RESPONSE);
}

#[tokio::test]
async fn test_ping_ignores_query_and_repeats() {
    for _ in 0..3 {
        let (status, body) = get("/ping?verbose=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"Hello, I am alive");
    }
}

#[tokio::test]
async fn test_health_reports_degraded_models() {
    let (status, body) = get("/health").await;
    assert_eq!(status, StatusCode::OK);

    let health: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(health["version"], mycoserve::version::VERSION);

    let models = health["models"].as_array().unwrap();
    assert_eq!(models.len(), 2);
    assert_eq!(models[0]["name"], "classifier");
    assert_eq!(models[0]["kind"], "classifier");
    assert_eq!(models[0]["state"], "unloaded");
    assert_eq!(models[1]["kind"], "generator");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let (status, _) = get("/v1/models").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
