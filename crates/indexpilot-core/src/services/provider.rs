//! Indexing provider trait and error types
//!
//! Defines the interface the dispatcher calls for each URL. The dispatcher
//! only cares whether a call succeeded, hit the credential's quota, or
//! failed for another reason; everything provider specific stays behind
//! this trait.

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::AccessToken;
use crate::models::{ChangeType, InspectionRecord};

// ============================================================================
// Error Types
// ============================================================================

/// Errors returned by a single provider call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// The credential used has no quota left
    #[error("Quota exhausted (HTTP {code}): {message}")]
    QuotaExhausted { code: u16, message: String },

    /// Provider answered with a non-success status
    #[error("API error (HTTP {code}): {message}")]
    Api { code: u16, message: String },

    /// Network request failed
    #[error("Network error: {0}")]
    Network(String),

    /// Failed to parse provider response
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProviderError {
    pub fn is_quota_exhausted(&self) -> bool {
        matches!(self, ProviderError::QuotaExhausted { .. })
    }

    /// HTTP status carried by the error, if the provider answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::QuotaExhausted { code, .. } | ProviderError::Api { code, .. } => {
                Some(*code)
            }
            ProviderError::Network(_) | ProviderError::Parse(_) => None,
        }
    }

    /// Human-readable reason for the outcome log
    pub fn reason(&self) -> String {
        match self {
            ProviderError::QuotaExhausted { message, .. } | ProviderError::Api { message, .. } => {
                message.clone()
            }
            ProviderError::Network(msg) => format!("network error: {}", msg),
            ProviderError::Parse(msg) => format!("unreadable response: {}", msg),
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Network("Request timed out".to_string())
        } else if err.is_connect() {
            ProviderError::Network("Connection failed".to_string())
        } else if let Some(status) = err.status() {
            let code = status.as_u16();
            if code == 429 {
                ProviderError::QuotaExhausted {
                    code,
                    message: err.to_string(),
                }
            } else {
                ProviderError::Api {
                    code,
                    message: err.to_string(),
                }
            }
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::Parse(err.to_string())
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// Successful submit call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitReceipt {
    /// HTTP status code the provider answered with
    pub status_code: u16,
}

/// Trait for the external crawl-priority and inspection APIs
///
/// One call per URL; implementations must not retry internally, the
/// dispatcher owns failover.
#[async_trait]
pub trait IndexingProvider: Send + Sync {
    /// Unique identifier for this provider, used in logs
    fn provider_id(&self) -> &'static str;

    /// Ask the provider to prioritise crawling `url`
    async fn submit(
        &self,
        token: &AccessToken,
        url: &str,
        change_type: ChangeType,
    ) -> Result<SubmitReceipt, ProviderError>;

    /// Look up the index status of `url` within `site_url`
    async fn inspect(
        &self,
        token: &AccessToken,
        url: &str,
        site_url: &str,
    ) -> Result<InspectionRecord, ProviderError>;
}
