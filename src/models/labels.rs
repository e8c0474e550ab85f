// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class-name tables (index -> label) shipped alongside a scoring model

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;

/// Labels of the bundled mushroom disease classifier, in output order
pub const MUSHROOM_CLASSES: &[&str] = &[
    "Bacterial Blotch",
    "Dry Bubble",
    "Healthy",
    "Trichoderma",
    "Wilt",
];

/// Ordered, duplicate-free label table aligned with a model's output indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
    labels: Vec<String>,
}

impl ClassTable {
    pub fn new<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels.into_iter().map(Into::into).collect();
        if labels.is_empty() {
            anyhow::bail!("Class table is empty");
        }

        let mut seen = HashSet::new();
        for label in &labels {
            if label.trim().is_empty() {
                anyhow::bail!("Class table contains an empty label");
            }
            if !seen.insert(label.as_str()) {
                anyhow::bail!("Duplicate label in class table: {}", label);
            }
        }

        Ok(Self { labels })
    }

    /// One label per line; blank lines and `#` comments are skipped.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read class table {}", path.display()))?;

        Self::new(
            text.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#')),
        )
        .with_context(|| format!("Invalid class table {}", path.display()))
    }

    pub fn mushroom() -> Self {
        Self {
            labels: MUSHROOM_CLASSES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}
