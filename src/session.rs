//! Per-worker rendering sessions
//!
//! A [`SessionResource`] wraps at most one live backend session for exactly one
//! worker. The session is launched lazily on first use, discarded after any
//! failed attempt, and released when the worker drains. Nothing else ever holds
//! the handle, so no lock guards it.

use crate::{Metrics, ScreenshotError, Viewport};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure reported by a rendering session. Each capability fails distinguishably.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("viewport update failed: {0}")]
    Viewport(String),

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("close failed: {0}")]
    Close(String),
}

/// A live browser session. Owned by one worker and never shared.
#[async_trait]
pub trait RenderSession: Send {
    async fn navigate(&mut self, address: &str) -> Result<(), BackendError>;

    async fn set_viewport(&mut self, viewport: &Viewport) -> Result<(), BackendError>;

    async fn capture_to_file(&mut self, path: &Path) -> Result<(), BackendError>;

    /// Graceful shutdown. Called at most once per session.
    async fn close(&mut self) -> Result<(), BackendError>;

    /// Best-effort synchronous teardown for paths that cannot await.
    fn abort(&mut self);
}

/// Factory for sessions. Launch failures surface as [`ScreenshotError::SessionInit`].
#[async_trait]
pub trait RenderBackend: Send + Sync {
    async fn launch(&self, worker_id: usize) -> Result<Box<dyn RenderSession>, ScreenshotError>;
}

pub struct SessionResource {
    worker_id: usize,
    backend: Arc<dyn RenderBackend>,
    handle: Option<Box<dyn RenderSession>>,
    launches: usize,
    releases: usize,
    metrics: Metrics,
}

impl SessionResource {
    pub fn new(worker_id: usize, backend: Arc<dyn RenderBackend>, metrics: Metrics) -> Self {
        Self {
            worker_id,
            backend,
            handle: None,
            launches: 0,
            releases: 0,
            metrics,
        }
    }

    /// Returns the live session, launching one if none exists.
    pub async fn acquire(&mut self) -> Result<&mut dyn RenderSession, ScreenshotError> {
        if self.handle.is_none() {
            debug!("Worker {} launching browser session", self.worker_id);
            let session = self.backend.launch(self.worker_id).await?;
            self.launches += 1;
            self.metrics.record_session_launch();
            info!(
                "Worker {} browser session ready (launch #{})",
                self.worker_id, self.launches
            );
            self.handle = Some(session);
        }

        match self.handle.as_deref_mut() {
            Some(session) => Ok(session),
            None => Err(ScreenshotError::SessionInit(format!(
                "worker {} has no session after launch",
                self.worker_id
            ))),
        }
    }

    /// Closes the live session, if any. Safe to call any number of times.
    pub async fn release(&mut self) {
        let Some(mut session) = self.handle.take() else {
            return;
        };

        if let Err(e) = session.close().await {
            warn!(
                "Worker {} session did not close cleanly, aborting: {}",
                self.worker_id, e
            );
            session.abort();
        }

        self.releases += 1;
        self.metrics.record_session_release();
        debug!("Worker {} session released", self.worker_id);
    }

    pub fn is_live(&self) -> bool {
        self.handle.is_some()
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn launches(&self) -> usize {
        self.launches
    }

    pub fn releases(&self) -> usize {
        self.releases
    }
}

impl Drop for SessionResource {
    fn drop(&mut self) {
        if let Some(mut session) = self.handle.take() {
            warn!(
                "Worker {} session dropped while live, aborting backend",
                self.worker_id
            );
            session.abort();
            self.metrics.record_session_release();
        }
    }
}
