//! Configuration management with serde serialization/deserialization
//!
//! All settings are read once at startup and layered in this order:
//! built-in defaults, an optional JSON file, environment variables (a `.env`
//! file is honoured), then command-line overrides.

use crate::ScreenshotError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for a capture run
///
/// # Examples
///
/// ```rust
/// use domain_screenshot::Config;
///
/// let config = Config {
///     max_workers: 8,
///     headless: false,
///     ..Default::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory receiving one PNG per domain (default: `img`)
    pub image_dir: PathBuf,

    /// Line-delimited domain list (default: `target.txt`)
    pub target_file: PathBuf,

    /// Browser viewport used for every capture
    pub viewport: Viewport,

    /// Width the captured image is scaled down to, aspect ratio preserved (default: 500)
    pub resize_width: u32,

    /// Fixed wait after navigation so dynamic content can render (default: 3 seconds)
    ///
    /// This is a plain delay, not a readiness check. Pages that need longer simply
    /// get captured half-rendered.
    pub settle_delay: Duration,

    /// Number of concurrent workers, each owning one browser session (default: 4)
    pub max_workers: usize,

    /// Retry behaviour for failed captures
    pub retry: RetryConfig,

    /// Upper bound on a single attempt, navigation through resize (default: 60 seconds)
    pub attempt_timeout: Duration,

    /// Run the browser without a visible window (default: true)
    pub headless: bool,

    /// Path to Chrome/Chromium executable (default: auto-detect)
    pub chrome_path: Option<String>,

    /// Custom User-Agent string (default: Chrome default)
    pub user_agent: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_dir: PathBuf::from("img"),
            target_file: PathBuf::from("target.txt"),
            viewport: Viewport::default(),
            resize_width: 500,
            settle_delay: Duration::from_secs(3),
            max_workers: 4,
            retry: RetryConfig::default(),
            attempt_timeout: Duration::from_secs(60),
            headless: true,
            chrome_path: None,
            user_agent: None,
        }
    }
}

impl Config {
    pub async fn from_file(path: &Path) -> Result<Self, ScreenshotError> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ScreenshotError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Applies the process environment on top of the current values.
    pub fn apply_env(&mut self) -> Result<(), ScreenshotError> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (`IMAGE_DIR`, `MAX_WORKERS`, `PAGE_LOAD_WAIT`, ...).
    /// Durations are whole seconds.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ScreenshotError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("IMAGE_DIR") {
            self.image_dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup("TARGET_FILE") {
            self.target_file = PathBuf::from(file);
        }
        if let Some(width) = parse_var(&lookup, "SCREENSHOT_WIDTH")? {
            self.viewport.width = width;
        }
        if let Some(height) = parse_var(&lookup, "SCREENSHOT_HEIGHT")? {
            self.viewport.height = height;
        }
        if let Some(width) = parse_var(&lookup, "SCREENSHOT_RESIZE_WIDTH")? {
            self.resize_width = width;
        }
        if let Some(secs) = parse_var(&lookup, "PAGE_LOAD_WAIT")? {
            self.settle_delay = Duration::from_secs(secs);
        }
        if let Some(workers) = parse_var(&lookup, "MAX_WORKERS")? {
            self.max_workers = workers;
        }
        if let Some(retries) = parse_var(&lookup, "MAX_RETRIES")? {
            self.retry.max_retries = retries;
        }
        if let Some(secs) = parse_var(&lookup, "RETRY_DELAY")? {
            self.retry.delay = Duration::from_secs(secs);
        }
        if let Some(headless) = lookup("HEADLESS") {
            self.headless = headless.trim().eq_ignore_ascii_case("true");
        }
        if let Some(path) = lookup("CHROME_PATH") {
            self.chrome_path = Some(path);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ScreenshotError> {
        if self.max_workers == 0 {
            return Err(ScreenshotError::Configuration(
                "max_workers must be greater than 0".to_string(),
            ));
        }
        if self.retry.max_retries == 0 {
            return Err(ScreenshotError::Configuration(
                "max_retries must be greater than 0".to_string(),
            ));
        }
        if self.retry.multiplier < 1.0 {
            return Err(ScreenshotError::Configuration(
                "retry multiplier must be at least 1.0".to_string(),
            ));
        }
        if self.viewport.width == 0 || self.viewport.height == 0 {
            return Err(ScreenshotError::Configuration(
                "viewport dimensions must be greater than 0".to_string(),
            ));
        }
        if !(self.viewport.device_scale_factor > 0.0 && self.viewport.device_scale_factor.is_finite()) {
            return Err(ScreenshotError::Configuration(
                "device_scale_factor must be a positive number".to_string(),
            ));
        }
        if self.resize_width == 0 {
            return Err(ScreenshotError::Configuration(
                "resize_width must be greater than 0".to_string(),
            ));
        }
        if self.attempt_timeout.is_zero() {
            return Err(ScreenshotError::Configuration(
                "attempt_timeout must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>, ScreenshotError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ScreenshotError::Configuration(format!("{key} has invalid value {raw:?}"))),
        None => Ok(None),
    }
}

/// Browser viewport configuration for captures
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Viewport {
    /// Viewport width in pixels (default: 1920)
    pub width: u32,

    /// Viewport height in pixels (default: 1080)
    pub height: u32,

    /// Device pixel ratio (default: 1.0)
    pub device_scale_factor: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            device_scale_factor: 1.0,
        }
    }
}

/// Bounded retry settings
///
/// The delay before attempt `n` (n ≥ 2) is `delay × multiplier^(n-2)`, capped at
/// `max_delay`. With the default multiplier of 1.0 every retry waits exactly `delay`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per domain, first attempt included (default: 3)
    pub max_retries: usize,
    /// Wait before each attempt after the first (default: 2 seconds)
    pub delay: Duration,
    /// Cap applied when `multiplier` > 1.0 (default: 30 seconds)
    pub max_delay: Duration,
    /// Growth factor between consecutive retries (default: 1.0)
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            multiplier: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.resize_width, 500);
        assert_eq!(config.settle_delay, Duration::from_secs(3));
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.delay, Duration::from_secs(2));
        assert_eq!(config.retry.multiplier, 1.0);
        assert!(config.headless);
        assert_eq!(config.viewport, Viewport::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("IMAGE_DIR", "shots"),
            ("SCREENSHOT_WIDTH", "1280"),
            ("SCREENSHOT_HEIGHT", "720"),
            ("PAGE_LOAD_WAIT", "5"),
            ("MAX_WORKERS", "8"),
            ("MAX_RETRIES", "2"),
            ("RETRY_DELAY", "1"),
            ("HEADLESS", "False"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_env_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.image_dir, PathBuf::from("shots"));
        assert_eq!(config.viewport.width, 1280);
        assert_eq!(config.viewport.height, 720);
        assert_eq!(config.settle_delay, Duration::from_secs(5));
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.delay, Duration::from_secs(1));
        assert!(!config.headless);
    }

    #[test]
    fn test_env_rejects_garbage() {
        let mut config = Config::default();
        let err = config
            .apply_env_from(|key| (key == "MAX_WORKERS").then(|| "many".to_string()))
            .unwrap_err();
        assert!(matches!(err, ScreenshotError::Configuration(_)));
    }

    #[test]
    fn test_validate() {
        let config = Config {
            max_workers: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.multiplier = 0.5;
        assert!(config.validate().is_err());

        let config = Config {
            resize_width: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.viewport.device_scale_factor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"max_workers": 2, "headless": false}"#).unwrap();
        assert_eq!(config.max_workers, 2);
        assert!(!config.headless);
        assert_eq!(config.resize_width, 500);
        assert_eq!(config.retry.max_retries, 3);
    }
}
