//! Services module
//!
//! ```text
//! CredentialPool ──► authorize_all(TokenSource) ──► QuotaTracker (per run)
//!                                                        │
//!            Rebalancer ──► Dispatcher ◄─────────────────┘
//!                               │  IndexingProvider (submit / inspect)
//!                               ▼
//!                          ResultStore (indexing_requests, url_inspections)
//! ```

pub mod credentials;
pub mod dispatcher;
pub mod google;
pub mod projects;
pub mod provider;
pub mod quota;
pub mod rebalance;
pub mod store;

pub use credentials::{
    authorize_all, AuthorizedCredential, CredentialPool, ServiceAccountTokenSource, TokenSource,
};
pub use dispatcher::{
    BatchItem, DispatchSummary, Dispatcher, UrlResult, ALL_EXHAUSTED_REASON, INVALID_URL_REASON,
    NOT_SUBMITTED_REASON,
};
pub use google::GoogleIndexingClient;
pub use projects::ProjectStore;
pub use provider::{IndexingProvider, ProviderError, SubmitReceipt};
pub use quota::{select, CredentialUsage, QuotaState, QuotaTracker};
pub use rebalance::{RebalanceReport, Rebalancer, NOTHING_TO_REBALANCE};
pub use store::{ResultStore, StatusCounts};
