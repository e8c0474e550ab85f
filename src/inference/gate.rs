// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Serialized access to a non-reentrant resource
//!
//! `tokio::sync::Mutex` hands the lock out in request order, which gives the
//! FIFO guarantee. The protected call runs on the blocking pool and owns the
//! lock until it returns: dropping the caller's future while the call is in
//! flight does not stop it, and the next waiter only starts afterwards.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("Gated call '{0}' panicked or was aborted: {1}")]
    Aborted(String, String),
}

/// FIFO mutual-exclusion gate around `T`
pub struct Gate<T> {
    name: Arc<str>,
    inner: Arc<Mutex<T>>,
    waiting: Arc<AtomicUsize>,
}

impl<T> Clone for Gate<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            inner: self.inner.clone(),
            waiting: self.waiting.clone(),
        }
    }
}

struct WaitTicket(Arc<AtomicUsize>);

impl Drop for WaitTicket {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl<T: Send + 'static> Gate<T> {
    pub fn new(name: impl Into<String>, value: T) -> Self {
        let name: String = name.into();
        Self {
            name: Arc::from(name),
            inner: Arc::new(Mutex::new(value)),
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Callers currently queued (not counting the one running)
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Wait for the gate, then run `f` on the blocking pool with exclusive
    /// access.
    pub async fn run<R, F>(&self, f: F) -> Result<R, GateError>
    where
        F: FnOnce(&mut T) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        let ticket = WaitTicket(self.waiting.clone());
        let mut guard = self.inner.clone().lock_owned().await;
        drop(ticket);

        debug!(gate = %self.name, queued = self.waiting(), "gate acquired");

        tokio::task::spawn_blocking(move || f(&mut *guard))
            .await
            .map_err(|e| GateError::Aborted(self.name.to_string(), e.to_string()))
    }

    #[cfg(test)]
    async fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.inner.lock().await;
        f(&*guard)
    }
}
