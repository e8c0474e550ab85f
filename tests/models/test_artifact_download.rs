// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{http::StatusCode, routing::get, Router};
use mycoserve::models::{ArtifactConfig, ArtifactError, ArtifactFetcher};
use sha2::{Digest, Sha256};
use std::net::SocketAddr;
use std::time::Duration;
use tempfile::TempDir;
use url::Url;

const WEIGHTS_LEN: usize = 4096;

fn weights() -> Vec<u8> {
    (0..WEIGHTS_LEN).map(|i| (i % 251) as u8).collect()
}

/// Serve a fake model host on an ephemeral port
async fn spawn_model_host() -> SocketAddr {
    let app = Router::new()
        .route("/weights.onnx", get(|| async { weights() }))
        .route("/stub.onnx", get(|| async { "tiny" }))
        .route(
            "/gone.onnx",
            get(|| async { (StatusCode::NOT_FOUND, "no such model") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn url(addr: SocketAddr, path: &str) -> Option<Url> {
    Some(Url::parse(&format!("http://{}{}", addr, path)).unwrap())
}

fn fetcher() -> ArtifactFetcher {
    ArtifactFetcher::new(Duration::from_secs(10)).unwrap()
}

#[tokio::test]
async fn test_download_stores_verified_artifact() {
    let addr = spawn_model_host().await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("nested").join("model.onnx");
    let checksum = hex::encode(Sha256::digest(weights()));

    let config = ArtifactConfig::new(&target)
        .with_url(url(addr, "/weights.onnx"))
        .with_sha256(Some(checksum));

    let path = tokio_test::assert_ok!(fetcher().ensure(&config).await);
    assert_eq!(path, target);
    assert_eq!(std::fs::read(&target).unwrap(), weights());

    // Second call finds the file and skips the network
    let again = ArtifactConfig::new(&target).with_url(url(addr, "/gone.onnx"));
    tokio_test::assert_ok!(fetcher().ensure(&again).await);
}

#[tokio::test]
async fn test_undersized_download_leaves_no_file() {
    let addr = spawn_model_host().await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("model.onnx");

    let config = ArtifactConfig::new(&target).with_url(url(addr, "/stub.onnx"));
    let err = fetcher().ensure(&config).await.unwrap_err();

    assert!(matches!(err, ArtifactError::TooSmall { size: 4, .. }));
    assert!(!target.exists());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_checksum_mismatch_leaves_no_file() {
    let addr = spawn_model_host().await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("model.onnx");

    let config = ArtifactConfig::new(&target)
        .with_url(url(addr, "/weights.onnx"))
        .with_sha256(Some("00".repeat(32)));
    let err = fetcher().ensure(&config).await.unwrap_err();

    assert!(matches!(err, ArtifactError::ChecksumMismatch { .. }));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_http_error_is_download_failure() {
    let addr = spawn_model_host().await;
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("model.onnx");

    let config = ArtifactConfig::new(&target).with_url(url(addr, "/gone.onnx"));
    let err = fetcher().ensure(&config).await.unwrap_err();

    assert!(matches!(err, ArtifactError::Download { .. }));
    assert!(!target.exists());
}
