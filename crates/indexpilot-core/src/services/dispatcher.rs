//! Indexing request dispatcher
//!
//! Drives a batch of URLs through submit or inspect, one external call per
//! URL per attempt, spreading load round-robin over the credentials that
//! are still eligible at each URL.
//!
//! # Per-URL algorithm (batch position `i`)
//!
//! ```text
//! eligible = tracker.eligible()
//!   empty ──────────────────────────────► quota_exhausted ("all connections exhausted")
//!   cred = eligible[i % len] ──► call
//!       ok ─────────────────────────────► record_use, success
//!       quota exhausted ──► mark_exhausted(cred)
//!           fallback = eligible'[i % len'] (one call, no cascade)
//!               none ───────────────────► quota_exhausted
//!               ok ─────────────────────► record_use, success
//!               quota exhausted ────────► mark_exhausted, quota_exhausted
//!               other ──────────────────► failed
//!       other failure ──────────────────► failed (no retry)
//! ```
//!
//! URLs are processed strictly in order with a fixed pacing delay between
//! external calls. Only "no credential configured" and "no credential could
//! be authorized" abort a run; everything else becomes an outcome row.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::credentials::{authorize_all, AuthorizedCredential, CredentialPool, TokenSource};
use super::provider::{IndexingProvider, ProviderError};
use super::quota::{CredentialUsage, QuotaTracker};
use super::store::ResultStore;
use crate::auth::TokenScope;
use crate::config::DispatchConfig;
use crate::error::{Error, Result};
use crate::models::{ChangeType, DispatchOutcome, InspectionRecord, Operation, OutcomeStatus, Project};
use crate::utils::{is_http_url, normalize_urls};

/// Reason recorded when no credential is eligible for a URL
pub const ALL_EXHAUSTED_REASON: &str = "all connections exhausted";

/// Reason recorded for URLs past the run's batch cap
pub const NOT_SUBMITTED_REASON: &str = "not submitted: batch exceeds available quota";

/// Reason recorded for entries that are not absolute http(s) URLs
pub const INVALID_URL_REASON: &str = "invalid url";

// ============================================================================
// Batch & Summary Types
// ============================================================================

/// One URL scheduled in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchItem {
    pub url: String,
    pub change_type: Option<ChangeType>,
    /// Existing `quota_exhausted` row to flip in place on success
    pub replaces: Option<String>,
}

impl BatchItem {
    pub fn new(url: impl Into<String>, change_type: Option<ChangeType>) -> Self {
        Self {
            url: url.into(),
            change_type,
            replaces: None,
        }
    }
}

/// Result of one URL within a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UrlResult {
    pub url: String,
    pub status: OutcomeStatus,
    pub credential_id: Option<String>,
    pub reason: Option<String>,
    pub response_code: Option<i64>,
    /// Outcome row written (or updated in place) for this URL
    pub outcome_id: String,
    /// False for URLs skipped without an external call
    pub attempted: bool,
    /// True when an existing exhausted row was flipped to success
    pub updated_in_place: bool,
}

/// JSON-shaped summary of one dispatch run
#[derive(Debug, Clone, Serialize)]
pub struct DispatchSummary {
    pub operation: Operation,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub quota_exhausted: usize,
    /// URLs past the batch cap, reported rather than silently dropped
    pub not_submitted: usize,
    /// External calls made, fallbacks included
    pub calls: usize,
    pub credentials: Vec<CredentialUsage>,
    pub results: Vec<UrlResult>,
}

impl DispatchSummary {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            total: 0,
            succeeded: 0,
            failed: 0,
            quota_exhausted: 0,
            not_submitted: 0,
            calls: 0,
            credentials: Vec::new(),
            results: Vec::new(),
        }
    }

    fn push(&mut self, result: UrlResult) {
        self.total += 1;
        match result.status {
            OutcomeStatus::Success => self.succeeded += 1,
            OutcomeStatus::Failed => self.failed += 1,
            OutcomeStatus::QuotaExhausted => self.quota_exhausted += 1,
        }
        self.results.push(result);
    }

    /// Number of credentials that completed at least one call
    pub fn credentials_used(&self) -> usize {
        self.credentials.iter().filter(|c| c.used > 0).count()
    }
}

/// Successful external call
struct CallSuccess {
    status_code: u16,
    inspection: Option<InspectionRecord>,
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Quota-aware dispatcher over a project's credential pool
///
/// Each call to [`submit`](Self::submit), [`inspect`](Self::inspect) or
/// [`retry`](Self::retry) is one run with its own fresh [`QuotaTracker`].
/// Callers must not run two dispatches for the same project concurrently.
pub struct Dispatcher {
    credentials: CredentialPool,
    store: ResultStore,
    tokens: Arc<dyn TokenSource>,
    provider: Arc<dyn IndexingProvider>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(
        credentials: CredentialPool,
        store: ResultStore,
        tokens: Arc<dyn TokenSource>,
        provider: Arc<dyn IndexingProvider>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            credentials,
            store,
            tokens,
            provider,
            config,
        }
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Submit a batch of URLs for crawling
    pub async fn submit(
        &self,
        project: &Project,
        urls: &[String],
        change_type: ChangeType,
    ) -> Result<DispatchSummary> {
        self.run_cleaned(project, Operation::Submit, urls, Some(change_type))
            .await
    }

    /// Inspect the index status of a batch of URLs
    pub async fn inspect(&self, project: &Project, urls: &[String]) -> Result<DispatchSummary> {
        self.run_cleaned(project, Operation::Inspect, urls, None).await
    }

    /// Re-issue one prior outcome as a one-URL run
    pub async fn retry(&self, project: &Project, outcome_id: &str) -> Result<DispatchSummary> {
        let prior = self
            .store
            .get(outcome_id)
            .await?
            .filter(|o| o.project_id == project.id)
            .ok_or_else(|| Error::not_found(format!("outcome {}", outcome_id)))?;

        // Rows recorded as invalid hold the raw input
        if !is_http_url(&prior.url) {
            return Err(Error::validation(format!(
                "outcome {} is not for an http(s) url: {}",
                outcome_id, prior.url
            )));
        }

        let change_type = match prior.operation {
            Operation::Submit => Some(prior.change_type.unwrap_or_default()),
            Operation::Inspect => None,
        };

        log::info!(
            "[dispatch] Retrying {} of {} (was {})",
            prior.operation,
            prior.url,
            prior.status
        );

        self.run(
            project,
            prior.operation,
            vec![BatchItem::new(prior.url, change_type)],
        )
        .await
    }

    async fn run_cleaned(
        &self,
        project: &Project,
        operation: Operation,
        urls: &[String],
        change_type: Option<ChangeType>,
    ) -> Result<DispatchSummary> {
        let cleaned = normalize_urls(urls);

        // Fatal checks come before any row is written
        let credentials = self.credentials.list(&project.id).await?;

        let mut summary = if cleaned.valid.is_empty() {
            let mut summary = DispatchSummary::new(operation);
            summary.credentials = credentials
                .iter()
                .map(|c| CredentialUsage {
                    credential_id: c.client_email.clone(),
                    used: 0,
                    exhausted: false,
                })
                .collect();
            summary
        } else {
            let items = cleaned
                .valid
                .into_iter()
                .map(|url| BatchItem::new(url, change_type))
                .collect();
            let authorized = authorize_all(self.tokens.as_ref(), credentials, operation.into()).await?;
            self.run_authorized(project, operation, items, authorized).await?
        };

        for url in cleaned.invalid {
            let outcome = DispatchOutcome::new(&project.id, &url, operation, OutcomeStatus::Failed)
                .with_change_type(change_type)
                .with_reason(INVALID_URL_REASON);
            self.store.record(&outcome).await?;
            summary.push(result_of(&outcome, false, false));
        }

        Ok(summary)
    }

    /// Run pre-built items (retry, rebalance)
    pub(crate) async fn run(
        &self,
        project: &Project,
        operation: Operation,
        items: Vec<BatchItem>,
    ) -> Result<DispatchSummary> {
        let credentials = self.credentials.list(&project.id).await?;
        let scope: TokenScope = operation.into();
        let authorized = authorize_all(self.tokens.as_ref(), credentials, scope).await?;
        self.run_authorized(project, operation, items, authorized).await
    }

    async fn run_authorized(
        &self,
        project: &Project,
        operation: Operation,
        items: Vec<BatchItem>,
        authorized: Vec<AuthorizedCredential>,
    ) -> Result<DispatchSummary> {
        let unit_cap = self.config.unit_cap(operation);
        let mut tracker = QuotaTracker::new(authorized, unit_cap);
        let batch_cap = (unit_cap as usize).saturating_mul(tracker.len());

        log::info!(
            "[dispatch] {} run via {} for project {}: {} url(s), {} credential(s), cap {}",
            operation,
            self.provider.provider_id(),
            project.name,
            items.len(),
            tracker.len(),
            batch_cap
        );

        let mut summary = DispatchSummary::new(operation);
        let mut items = items;
        let overflow = if items.len() > batch_cap {
            items.split_off(batch_cap)
        } else {
            Vec::new()
        };

        for (index, item) in items.into_iter().enumerate() {
            let outcome = self
                .dispatch_one(&mut tracker, project, operation, &item, index, &mut summary.calls)
                .await?;
            let result = self.persist(&item, outcome).await?;
            summary.push(result);
        }

        if !overflow.is_empty() {
            log::warn!(
                "[dispatch] {} url(s) over the batch cap were not submitted",
                overflow.len()
            );
        }
        for item in overflow {
            let outcome =
                DispatchOutcome::new(&project.id, &item.url, operation, OutcomeStatus::QuotaExhausted)
                    .with_change_type(item.change_type)
                    .with_reason(NOT_SUBMITTED_REASON);
            let mut result = self.persist(&item, outcome).await?;
            result.attempted = false;
            summary.not_submitted += 1;
            summary.push(result);
        }

        summary.credentials = tracker.usage();

        log::info!(
            "[dispatch] {} run finished: {} succeeded, {} failed, {} quota exhausted, {} not submitted, {} call(s)",
            operation,
            summary.succeeded,
            summary.failed,
            summary.quota_exhausted,
            summary.not_submitted,
            summary.calls
        );

        Ok(summary)
    }

    /// Assign one URL, call the provider (with at most one fallback) and
    /// build the outcome; nothing is persisted here except inspection data
    async fn dispatch_one(
        &self,
        tracker: &mut QuotaTracker,
        project: &Project,
        operation: Operation,
        item: &BatchItem,
        index: usize,
        calls: &mut usize,
    ) -> Result<DispatchOutcome> {
        let base = |status| {
            DispatchOutcome::new(&project.id, &item.url, operation, status)
                .with_change_type(item.change_type)
        };

        let Some(slot) = tracker.select(index) else {
            return Ok(base(OutcomeStatus::QuotaExhausted).with_reason(ALL_EXHAUSTED_REASON));
        };

        let first = self
            .call(tracker.credential(slot), project, operation, item, calls)
            .await;

        let (slot, result) = match first {
            Err(e) if e.is_quota_exhausted() => {
                tracker.mark_exhausted(slot);
                match tracker.select(index) {
                    Some(fallback) => {
                        log::debug!(
                            "[dispatch] {} exhausted on {}, falling back to {}",
                            tracker.credential(slot).id(),
                            item.url,
                            tracker.credential(fallback).id()
                        );
                        let second = self
                            .call(tracker.credential(fallback), project, operation, item, calls)
                            .await;
                        (fallback, second)
                    }
                    None => (slot, Err(e)),
                }
            }
            other => (slot, other),
        };

        let credential_id = tracker.credential(slot).id().to_string();

        match result {
            Ok(success) => {
                tracker.record_use(slot);
                if let Some(record) = &success.inspection {
                    self.store
                        .upsert_inspection(&project.id, &item.url, record, Utc::now())
                        .await?;
                }
                Ok(base(OutcomeStatus::Success)
                    .with_credential(credential_id)
                    .with_response_code(success.status_code))
            }
            Err(e) => {
                let status = if e.is_quota_exhausted() {
                    tracker.mark_exhausted(slot);
                    OutcomeStatus::QuotaExhausted
                } else {
                    log::warn!("[dispatch] {} {} failed: {}", operation, item.url, e);
                    OutcomeStatus::Failed
                };
                let mut outcome = base(status)
                    .with_credential(credential_id)
                    .with_reason(e.reason());
                if let Some(code) = e.status_code() {
                    outcome = outcome.with_response_code(code);
                }
                Ok(outcome)
            }
        }
    }

    /// One paced external call
    async fn call(
        &self,
        credential: &AuthorizedCredential,
        project: &Project,
        operation: Operation,
        item: &BatchItem,
        calls: &mut usize,
    ) -> std::result::Result<CallSuccess, ProviderError> {
        if *calls > 0 && self.config.pacing_delay_ms > 0 {
            tokio::time::sleep(self.config.pacing_delay()).await;
        }
        *calls += 1;

        match operation {
            Operation::Submit => {
                let change_type = item.change_type.unwrap_or_default();
                let receipt = self
                    .provider
                    .submit(&credential.token, &item.url, change_type)
                    .await?;
                Ok(CallSuccess {
                    status_code: receipt.status_code,
                    inspection: None,
                })
            }
            Operation::Inspect => {
                let site = credential.credential.site_or(&project.site_url);
                let record = self
                    .provider
                    .inspect(&credential.token, &item.url, site)
                    .await?;
                Ok(CallSuccess {
                    status_code: 200,
                    inspection: Some(record),
                })
            }
        }
    }

    /// Write the outcome: in place for a rebalanced success, append otherwise
    async fn persist(&self, item: &BatchItem, outcome: DispatchOutcome) -> Result<UrlResult> {
        if outcome.status == OutcomeStatus::Success {
            if let Some(row_id) = &item.replaces {
                if self.store.mark_rebalanced(row_id, &outcome).await? {
                    let mut result = result_of(&outcome, true, true);
                    result.outcome_id = row_id.clone();
                    return Ok(result);
                }
                log::warn!(
                    "[dispatch] Row {} for {} changed since it was read; appending instead",
                    row_id,
                    item.url
                );
            }
        }

        self.store.record(&outcome).await?;
        Ok(result_of(&outcome, true, false))
    }
}

fn result_of(outcome: &DispatchOutcome, attempted: bool, updated_in_place: bool) -> UrlResult {
    UrlResult {
        url: outcome.url.clone(),
        status: outcome.status,
        credential_id: outcome.credential_id.clone(),
        reason: outcome.reason.clone(),
        response_code: outcome.response_code,
        outcome_id: outcome.id.clone(),
        attempted,
        updated_in_place,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(status: OutcomeStatus) -> DispatchOutcome {
        DispatchOutcome::new("p", "https://a.test/", Operation::Submit, status)
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = DispatchSummary::new(Operation::Submit);
        summary.push(result_of(&outcome(OutcomeStatus::Success), true, false));
        summary.push(result_of(&outcome(OutcomeStatus::Failed), true, false));
        summary.push(result_of(&outcome(OutcomeStatus::QuotaExhausted), false, false));
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.quota_exhausted, 1);
    }

    #[test]
    fn test_credentials_used() {
        let mut summary = DispatchSummary::new(Operation::Inspect);
        summary.credentials = vec![
            CredentialUsage { credential_id: "a".to_string(), used: 3, exhausted: false },
            CredentialUsage { credential_id: "b".to_string(), used: 0, exhausted: true },
        ];
        assert_eq!(summary.credentials_used(), 1);
    }

    #[test]
    fn test_summary_serializes_snake_case() {
        let summary = DispatchSummary::new(Operation::Submit);
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["operation"], "submit");
        assert_eq!(json["not_submitted"], 0);
    }
}
