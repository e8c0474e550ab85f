// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use image::{ImageFormat, Rgb, RgbImage};
use mycoserve::api::{create_app, AppState};
use mycoserve::assessment::{AssessmentGenerator, GenerationConfig};
use mycoserve::inference::{
    CoordinateSpace, InferenceService, InferenceSettings, ModelHandle, ModelKind, RawDetection,
    RawOutput, ScoringBackend,
};
use mycoserve::models::ClassTable;
use mycoserve::vision::PreparedTensor;
use serde_json::Value;
use std::io::Cursor;
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "myco-test-boundary";

struct FixedScores(Vec<f32>);

impl ScoringBackend for FixedScores {
    fn kind(&self) -> ModelKind {
        ModelKind::Classifier
    }

    fn score(&mut self, input: &PreparedTensor) -> anyhow::Result<RawOutput> {
        assert_eq!(input.shape(), &[1, 256, 256, 3]);
        Ok(RawOutput::Scores(self.0.clone()))
    }
}

struct FixedBoxes(Vec<RawDetection>);

impl ScoringBackend for FixedBoxes {
    fn kind(&self) -> ModelKind {
        ModelKind::Detector
    }

    fn score(&mut self, _input: &PreparedTensor) -> anyhow::Result<RawOutput> {
        Ok(RawOutput::Detections {
            detections: self.0.clone(),
            space: CoordinateSpace::Original,
        })
    }
}

struct Crashing;

impl ScoringBackend for Crashing {
    fn kind(&self) -> ModelKind {
        ModelKind::Classifier
    }

    fn score(&mut self, _input: &PreparedTensor) -> anyhow::Result<RawOutput> {
        anyhow::bail!("ORT session poisoned at /opt/models/internal.onnx")
    }
}

fn state_with(kind: ModelKind, backend: Box<dyn ScoringBackend>) -> Arc<AppState> {
    let inference = InferenceService::new(
        ModelHandle::ready("scoring", backend),
        kind,
        ClassTable::mushroom(),
        InferenceSettings::for_kind(kind),
    );
    let generator = AssessmentGenerator::new(ModelHandle::new("generator"), GenerationConfig::default());
    Arc::new(AppState::new(Arc::new(inference), Arc::new(generator)))
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([180, 160, 120]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

fn multipart_body(field: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"upload.png\"\r\n",
            field
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

async fn post_upload(state: Arc<AppState>, field: &str, payload: &[u8]) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(field, payload)))
        .unwrap();

    let response = create_app(state).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_predict_returns_top_two_classes() {
    let state = state_with(
        ModelKind::Classifier,
        Box::new(FixedScores(vec![0.05, 0.10, 0.70, 0.05, 0.10])),
    );

    let (status, body) = post_upload(state, "file", &png(64, 48)).await;
    assert_eq!(status, StatusCode::OK);

    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 2);
    assert_eq!(predictions[0]["class"], "Healthy");
    assert!((predictions[0]["confidence"].as_f64().unwrap() - 0.70).abs() < 1e-6);
    // 0.10 tie resolves to the lower index
    assert_eq!(predictions[1]["class"], "Dry Bubble");
}

#[tokio::test]
async fn test_predict_detector_filters_and_clamps() {
    let boxes = vec![
        RawDetection {
            class_index: 4,
            confidence: 0.9,
            xmin: 10.0,
            ymin: 10.0,
            xmax: 50.0,
            ymax: 40.0,
        },
        RawDetection {
            class_index: 0,
            confidence: 0.3,
            xmin: 0.0,
            ymin: 0.0,
            xmax: 20.0,
            ymax: 20.0,
        },
        RawDetection {
            class_index: 1,
            confidence: 0.6,
            xmin: -5.0,
            ymin: 30.0,
            xmax: 500.0,
            ymax: 79.6,
        },
    ];
    let state = state_with(ModelKind::Detector, Box::new(FixedBoxes(boxes)));

    let (status, body) = post_upload(state, "file", &png(100, 80)).await;
    assert_eq!(status, StatusCode::OK);

    let detections = body["detections"].as_array().unwrap();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0]["class"], "Wilt");
    assert_eq!(detections[0]["box"], serde_json::json!([10, 10, 50, 40]));
    assert_eq!(detections[1]["class"], "Dry Bubble");
    assert_eq!(detections[1]["box"], serde_json::json!([0, 30, 99, 79]));
}

#[tokio::test]
async fn test_predict_rejects_non_image() {
    let state = state_with(ModelKind::Classifier, Box::new(FixedScores(vec![0.2; 5])));

    let (status, body) = post_upload(state, "file", b"definitely not a picture").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid image"));
}

#[tokio::test]
async fn test_predict_requires_file_field() {
    let state = state_with(ModelKind::Classifier, Box::new(FixedScores(vec![0.2; 5])));

    let (status, body) = post_upload(state, "image", &png(8, 8)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No 'file' field in upload");
}

#[tokio::test]
async fn test_predict_rejects_non_multipart_body() {
    let state = state_with(ModelKind::Classifier, Box::new(FixedScores(vec![0.2; 5])));
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();

    let response = create_app(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_predict_unloaded_model_is_503() {
    let state = Arc::new(AppState::new_for_test());

    let (status, body) = post_upload(state, "file", &png(8, 8)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("classifier"));
}

#[tokio::test]
async fn test_predict_backend_failure_is_opaque_500() {
    let state = state_with(ModelKind::Classifier, Box::new(Crashing));

    let (status, body) = post_upload(state, "file", &png(8, 8)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Inference failed");
}

#[tokio::test]
async fn test_predict_score_count_mismatch_is_500() {
    // Seven scores against the five-label table; the extras rank lowest
    let state = state_with(
        ModelKind::Classifier,
        Box::new(FixedScores(vec![0.9, 0.8, 0.1, 0.1, 0.1, 0.05, 0.02])),
    );

    let (status, body) = post_upload(state, "file", &png(8, 8)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Inference failed");
}

#[tokio::test]
async fn test_concurrent_predictions_all_succeed() {
    let state = state_with(
        ModelKind::Classifier,
        Box::new(FixedScores(vec![0.1, 0.1, 0.1, 0.6, 0.1])),
    );
    let image = png(32, 32);

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let state = state.clone();
            let image = image.clone();
            tokio::spawn(async move { post_upload(state, "file", &image).await })
        })
        .collect();

    for task in tasks {
        let (status, body) = task.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["predictions"][0]["class"], "Trichoderma");
    }
}
