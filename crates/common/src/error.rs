//! Error types for Shopcheck

use thiserror::Error;

/// Result type alias using Shopcheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// Configuration and validation errors. Anything here is raised before a
/// browser session is allocated.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Missing required parameters: {}", .0.join(", "))]
    MissingParameters(Vec<String>),

    #[error("No journeys specified")]
    NoJourneys,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether this error was caused by the caller's input rather than the
    /// local environment.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::MissingParameters(_) | Error::NoJourneys | Error::InvalidConfig(_)
        )
    }
}
