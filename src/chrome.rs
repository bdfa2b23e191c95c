//! Chrome rendering backend
//!
//! Each worker gets its own headless Chrome process driven over the DevTools
//! protocol by chromiumoxide. Processes never share a profile directory, so
//! concurrent launches do not trip Chrome's singleton lock.

use crate::session::{BackendError, RenderBackend, RenderSession};
use crate::{Config, ScreenshotError, Viewport};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Launches one Chrome process per session.
pub struct ChromeBackend {
    config: Config,
}

impl ChromeBackend {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn user_data_dir(worker_id: usize) -> PathBuf {
        std::env::temp_dir().join(format!(
            "domain-screenshot-{}-{}",
            std::process::id(),
            worker_id
        ))
    }
}

#[async_trait]
impl RenderBackend for ChromeBackend {
    async fn launch(&self, worker_id: usize) -> Result<Box<dyn RenderSession>, ScreenshotError> {
        let user_data_dir = Self::user_data_dir(worker_id);
        std::fs::create_dir_all(&user_data_dir).map_err(|e| {
            ScreenshotError::SessionInit(format!(
                "cannot create profile dir {}: {}",
                user_data_dir.display(),
                e
            ))
        })?;

        let browser_config = create_browser_config(&self.config, &user_data_dir)?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| ScreenshotError::SessionInit(e.to_string()))?;

        // The handler stream drives all CDP traffic and must be polled for the
        // browser to make progress.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Worker {} CDP handler error: {}", worker_id, e);
                }
            }
            debug!("Worker {} CDP handler stream ended", worker_id);
        });

        Ok(Box::new(ChromeSession {
            worker_id,
            browser: Some(browser),
            handler,
            page: None,
            user_data_dir,
        }))
    }
}

/// Command-line switches passed to every Chrome process.
///
/// # Examples
///
/// ```rust
/// use domain_screenshot::{Config, get_chrome_args};
///
/// let args = get_chrome_args(&Config::default());
/// assert!(args.contains(&"--window-size=1920,1080".to_string()));
/// ```
pub fn get_chrome_args(config: &Config) -> Vec<String> {
    let mut args = Vec::new();
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.extend([
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-gpu".to_string(),
        "--no-first-run".to_string(),
        "--disable-extensions".to_string(),
        format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        ),
    ]);

    if let Some(user_agent) = &config.user_agent {
        args.push(format!("--user-agent={}", user_agent));
    }

    args
}

pub fn create_browser_config(
    config: &Config,
    user_data_dir: &Path,
) -> Result<BrowserConfig, ScreenshotError> {
    let mut builder = BrowserConfig::builder()
        .window_size(config.viewport.width, config.viewport.height)
        .user_data_dir(user_data_dir)
        .args(get_chrome_args(config));

    if !config.headless {
        builder = builder.with_head();
    }
    if let Some(chrome_path) = &config.chrome_path {
        builder = builder.chrome_executable(chrome_path);
    }

    builder.build().map_err(ScreenshotError::SessionInit)
}

struct ChromeSession {
    worker_id: usize,
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    page: Option<Page>,
    user_data_dir: PathBuf,
}

impl ChromeSession {
    fn browser(&self) -> Result<&Browser, String> {
        self.browser
            .as_ref()
            .ok_or_else(|| "browser already closed".to_string())
    }

    async fn page(&mut self) -> Result<&Page, String> {
        if self.page.is_none() {
            let page = self
                .browser()?
                .new_page("about:blank")
                .await
                .map_err(|e| e.to_string())?;
            self.page = Some(page);
        }
        self.page
            .as_ref()
            .ok_or_else(|| "page unavailable".to_string())
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn navigate(&mut self, address: &str) -> Result<(), BackendError> {
        let page = self.page().await.map_err(BackendError::Navigation)?;
        page.goto(address)
            .await
            .map_err(|e| BackendError::Navigation(e.to_string()))?;
        Ok(())
    }

    async fn set_viewport(&mut self, viewport: &Viewport) -> Result<(), BackendError> {
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(viewport.width as i64)
            .height(viewport.height as i64)
            .device_scale_factor(viewport.device_scale_factor)
            .mobile(false)
            .build()
            .map_err(BackendError::Viewport)?;

        let page = self.page().await.map_err(BackendError::Viewport)?;
        page.execute(params)
            .await
            .map_err(|e| BackendError::Viewport(e.to_string()))?;
        Ok(())
    }

    async fn capture_to_file(&mut self, path: &Path) -> Result<(), BackendError> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();

        let page = self.page().await.map_err(BackendError::Capture)?;
        page.save_screenshot(params, path)
            .await
            .map_err(|e| BackendError::Capture(e.to_string()))?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Worker {} page close failed: {}", self.worker_id, e);
            }
        }

        let result = match self.browser.as_mut() {
            Some(browser) => match browser.close().await {
                Ok(_) => match timeout(CLOSE_GRACE, browser.wait()).await {
                    Ok(Ok(_)) => Ok(()),
                    Ok(Err(e)) => Err(BackendError::Close(e.to_string())),
                    Err(_) => Err(BackendError::Close(format!(
                        "browser did not exit within {:?}",
                        CLOSE_GRACE
                    ))),
                },
                Err(e) => Err(BackendError::Close(e.to_string())),
            },
            None => Ok(()),
        };

        if result.is_ok() {
            self.browser = None;
            self.handler.abort();
            if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
                debug!(
                    "Worker {} could not remove {}: {}",
                    self.worker_id,
                    self.user_data_dir.display(),
                    e
                );
            }
        }
        result
    }

    fn abort(&mut self) {
        self.page = None;
        if self.browser.take().is_some() {
            warn!("Worker {} browser process torn down forcibly", self.worker_id);
        }
        self.handler.abort();
        let _ = std::fs::remove_dir_all(&self.user_data_dir);
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}
