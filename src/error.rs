use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ScreenshotError {
    #[error("Session initialisation failed: {0}")]
    SessionInit(String),

    #[error("Navigation to {domain} failed: {reason}")]
    Navigation { domain: String, reason: String },

    #[error("Capture of {domain} failed: {reason}")]
    Capture { domain: String, reason: String },

    #[error("Attempt for {domain} timed out after {after:?}")]
    Timeout { domain: String, after: Duration },

    #[error("Input error: {0}")]
    Input(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ScreenshotError {
    pub fn navigation(domain: impl Into<String>, reason: impl ToString) -> Self {
        ScreenshotError::Navigation {
            domain: domain.into(),
            reason: reason.to_string(),
        }
    }

    pub fn capture(domain: impl Into<String>, reason: impl ToString) -> Self {
        ScreenshotError::Capture {
            domain: domain.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors that abort a whole run before any worker starts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ScreenshotError::Input(_)
                | ScreenshotError::Output(_)
                | ScreenshotError::Configuration(_)
        )
    }

    /// Errors the retry controller absorbs into another attempt or a failed outcome.
    pub fn is_attempt_failure(&self) -> bool {
        matches!(
            self,
            ScreenshotError::SessionInit(_)
                | ScreenshotError::Navigation { .. }
                | ScreenshotError::Capture { .. }
                | ScreenshotError::Timeout { .. }
        )
    }

    /// Stable label used for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ScreenshotError::SessionInit(_) => "session_init",
            ScreenshotError::Navigation { .. } => "navigation",
            ScreenshotError::Capture { .. } => "capture",
            ScreenshotError::Timeout { .. } => "timeout",
            ScreenshotError::Input(_) => "input",
            ScreenshotError::Output(_) => "output",
            ScreenshotError::Configuration(_) => "configuration",
        }
    }
}

impl From<serde_json::Error> for ScreenshotError {
    fn from(err: serde_json::Error) -> Self {
        ScreenshotError::Configuration(err.to_string())
    }
}
