//! Single capture attempt: navigate, settle, size the viewport, capture, resize.

use crate::resize::ImageResizer;
use crate::session::RenderSession;
use crate::{validate_url, Artifact, Config, Domain, ScreenshotError, Viewport};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

#[derive(Clone)]
pub struct TaskExecutor {
    viewport: Viewport,
    resize_width: u32,
    settle_delay: Duration,
    attempt_timeout: Duration,
    resizer: Arc<dyn ImageResizer>,
}

impl TaskExecutor {
    pub fn new(config: &Config, resizer: Arc<dyn ImageResizer>) -> Self {
        Self {
            viewport: config.viewport.clone(),
            resize_width: config.resize_width,
            settle_delay: config.settle_delay,
            attempt_timeout: config.attempt_timeout,
            resizer,
        }
    }

    /// Runs one attempt against `session`.
    ///
    /// The attempt timeout bounds the backend steps only. The resize runs on the
    /// blocking pool, which cannot be cancelled, so it is always awaited to
    /// completion before the attempt returns. A failed resize leaves the
    /// full-size capture at the artifact path; a later successful attempt
    /// overwrites it.
    pub async fn execute(
        &self,
        session: &mut dyn RenderSession,
        domain: &Domain,
        output_dir: &Path,
    ) -> Result<Artifact, ScreenshotError> {
        let path = domain.artifact_path(output_dir);
        match timeout(self.attempt_timeout, self.capture(session, domain, &path)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(ScreenshotError::Timeout {
                    domain: domain.to_string(),
                    after: self.attempt_timeout,
                })
            }
        }

        let (width, height) = self.resize(domain, &path).await?;
        Ok(Artifact {
            domain: domain.clone(),
            path,
            width,
            height,
        })
    }

    async fn capture(
        &self,
        session: &mut dyn RenderSession,
        domain: &Domain,
        path: &Path,
    ) -> Result<(), ScreenshotError> {
        let address = domain.address();
        validate_url(&address).map_err(|e| ScreenshotError::navigation(domain.as_str(), e))?;

        debug!("Navigating to {}", address);
        session
            .navigate(&address)
            .await
            .map_err(|e| ScreenshotError::navigation(domain.as_str(), e))?;

        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }

        session
            .set_viewport(&self.viewport)
            .await
            .map_err(|e| ScreenshotError::capture(domain.as_str(), e))?;

        session
            .capture_to_file(path)
            .await
            .map_err(|e| ScreenshotError::capture(domain.as_str(), e))
    }

    async fn resize(&self, domain: &Domain, path: &Path) -> Result<(u32, u32), ScreenshotError> {
        let resizer = self.resizer.clone();
        let resize_path = path.to_path_buf();
        let target_width = self.resize_width;
        tokio::task::spawn_blocking(move || resizer.resize_to_width(&resize_path, target_width))
            .await
            .map_err(|e| ScreenshotError::capture(domain.as_str(), e))?
            .map_err(|e| ScreenshotError::capture(domain.as_str(), e))
    }
}
