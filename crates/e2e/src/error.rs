//! Error types for the journey engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("WebDriver failed to start: {0}")]
    DriverStartup(String),

    #[error("WebDriver health check failed after {0} attempts")]
    DriverHealthCheck(usize),

    #[error("Browser session could not be opened: {0}")]
    SessionStart(String),

    #[error("Timeout after {waited_ms} ms waiting for: {what}")]
    Timeout { what: String, waited_ms: u64 },

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Stale element reference: {0}")]
    StaleElement(String),

    #[error("Element rejected interaction: {0}")]
    Interaction(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Screenshot failed: {0}")]
    Screenshot(String),

    #[error("Profile parse error: {0}")]
    ProfileParse(String),

    #[error("Configuration error: {0}")]
    Config(#[from] shopcheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl E2eError {
    /// Faults a polling wait should ride out: the element may simply not be
    /// rendered yet, or was replaced by a re-render.
    pub fn is_transient(&self) -> bool {
        matches!(self, E2eError::ElementNotFound(_) | E2eError::StaleElement(_))
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
