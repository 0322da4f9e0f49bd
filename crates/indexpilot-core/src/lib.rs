//! # indexpilot-core
//!
//! Quota-aware indexing request dispatcher.
//!
//! This crate provides:
//! - Database operations (`db` module)
//! - Data models (`models` module)
//! - Service-account token exchange (`auth` module)
//! - Dispatch configuration (`config` module)
//! - Credential pooling, quota tracking, dispatch, storage and rebalance
//!   (`services` module)
//! - Unified error handling (`error` module)

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

// Re-exports for convenience
pub use config::DispatchConfig;
pub use db::Database;
pub use error::{Error, Result};

// Re-export commonly used types from models
pub use models::{
    ChangeType, Credential, CredentialResponse, DispatchOutcome, InspectionRecord, InventoryItem,
    Operation, OutcomeStatus, Project, ServiceAccountKey, StoredInspection,
};

// Re-export commonly used types from services
pub use services::{
    CredentialPool, DispatchSummary, Dispatcher, GoogleIndexingClient, IndexingProvider,
    ProjectStore, ProviderError, RebalanceReport, Rebalancer, ResultStore,
    ServiceAccountTokenSource, StatusCounts, TokenSource, UrlResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
