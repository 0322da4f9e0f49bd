//! Unified error handling for indexpilot-core

use thiserror::Error;

/// Core error type for indexpilot-core
///
/// Per-URL problems (quota exhaustion, provider rejections) are recorded as
/// outcomes instead of being returned as errors. `NotConfigured` and `Auth`
/// abort a whole dispatch run; see [`Error::is_fatal_dispatch`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The project has no usable credential at all
    #[error("No credential configured: {0}")]
    NotConfigured(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Result type alias for indexpilot-core
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a "no credential configured" error
    pub fn not_configured(msg: impl Into<String>) -> Self {
        Error::NotConfigured(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Error::Auth(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Whether this error aborted a dispatch run before any URL was attempted
    pub fn is_fatal_dispatch(&self) -> bool {
        matches!(self, Error::NotConfigured(_) | Error::Auth(_))
    }
}
