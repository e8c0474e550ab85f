// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Model artifact presence, atomic fetch and integrity checks
//!
//! The size floor is a heuristic against truncated or placeholder downloads
//! (an HTML error page, a git-lfs pointer). It is not a cryptographic check;
//! set `sha256` when a content hash is known.

use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Default floor for a model file. Real weights are megabytes; anything below
/// this is almost certainly an error body or a pointer file.
pub const DEFAULT_MIN_BYTES: u64 = 1024;

/// Where a model artifact lives and how to get it when it doesn't
#[derive(Debug, Clone)]
pub struct ArtifactConfig {
    pub path: PathBuf,
    pub url: Option<Url>,
    pub min_bytes: u64,
    /// Lowercase hex SHA-256 of the expected content
    pub sha256: Option<String>,
}

impl ArtifactConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            url: None,
            min_bytes: DEFAULT_MIN_BYTES,
            sha256: None,
        }
    }

    pub fn with_url(mut self, url: Option<Url>) -> Self {
        self.url = url;
        self
    }

    pub fn with_min_bytes(mut self, min_bytes: u64) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    pub fn with_sha256(mut self, sha256: Option<String>) -> Self {
        self.sha256 = sha256.map(|h| h.to_lowercase());
        self
    }
}

/// The artifact could not be made available. Fatal for the model that needs it.
#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact not found at {path} and no download URL configured")]
    Missing { path: PathBuf },
    #[error("Artifact download from {url} failed: {message}")]
    Download { url: String, message: String },
    #[error("Artifact {path} is {size} bytes, below the {min_bytes} byte minimum")]
    TooSmall {
        path: PathBuf,
        size: u64,
        min_bytes: u64,
    },
    #[error("Checksum mismatch - expected: {expected}, actual: {actual}")]
    ChecksumMismatch { expected: String, actual: String },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ArtifactError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Fetches artifacts over HTTP(S)
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: reqwest::Client,
}

impl ArtifactFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// Make sure the artifact exists locally and passes the integrity checks.
    ///
    /// A missing file is downloaded into a temporary file next to the target,
    /// verified, then renamed into place, so a rejected download never leaves
    /// anything at `config.path`.
    pub async fn ensure(&self, config: &ArtifactConfig) -> Result<PathBuf, ArtifactError> {
        if config.path.exists() {
            debug!("Artifact present at {}", config.path.display());
            verify_file(&config.path, config)?;
            return Ok(config.path.clone());
        }

        let Some(url) = config.url.as_ref() else {
            return Err(ArtifactError::Missing {
                path: config.path.clone(),
            });
        };

        info!("Downloading {} -> {}", url, config.path.display());
        let tmp = self.download_to_temp(url, &config.path).await?;

        verify_file(tmp.path(), config).inspect_err(|e| {
            warn!("Rejecting download from {}: {}", url, e);
        })?;

        tmp.persist(&config.path)
            .map_err(|e| ArtifactError::io(&config.path, e.error))?;

        info!("✅ Artifact stored at {}", config.path.display());
        Ok(config.path.clone())
    }

    async fn download_to_temp(&self, url: &Url, target: &Path) -> Result<NamedTempFile, ArtifactError> {
        let download_err = |message: String| ArtifactError::Download {
            url: url.to_string(),
            message,
        };

        let dir = match target.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| ArtifactError::io(&dir, e))?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| ArtifactError::io(&dir, e))?;

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_err(e.to_string()))?;

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| download_err(e.to_string()))?
        {
            tmp.write_all(&chunk)
                .map_err(|e| ArtifactError::io(tmp.path(), e))?;
            written += chunk.len() as u64;
        }
        tmp.flush().map_err(|e| ArtifactError::io(tmp.path(), e))?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(tmp)
    }
}

/// Size floor, then optional content hash
pub fn verify_file(path: &Path, config: &ArtifactConfig) -> Result<(), ArtifactError> {
    let size = std::fs::metadata(path)
        .map_err(|e| ArtifactError::io(path, e))?
        .len();

    if size < config.min_bytes {
        return Err(ArtifactError::TooSmall {
            path: config.path.clone(),
            size,
            min_bytes: config.min_bytes,
        });
    }

    if let Some(expected) = &config.sha256 {
        let actual = sha256_file(path)?;
        if &actual != expected {
            return Err(ArtifactError::ChecksumMismatch {
                expected: expected.clone(),
                actual,
            });
        }
    }

    Ok(())
}

fn sha256_file(path: &Path) -> Result<String, ArtifactError> {
    let mut file = std::fs::File::open(path).map_err(|e| ArtifactError::io(path, e))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(|e| ArtifactError::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}
