//! Rebalance sweep
//!
//! Replays every URL whose latest recorded outcome is a quota-exhausted
//! submit through the dispatcher, now that capacity may have freed up (new
//! day, a credential was added, other processes' usage expired).
//!
//! Successes flip the existing exhausted row in place; anything else is
//! appended like a normal run.

use serde::Serialize;

use super::dispatcher::{BatchItem, DispatchSummary, Dispatcher};
use crate::error::Result;
use crate::models::{Operation, OutcomeStatus, Project};

/// Message reported when there is nothing to replay
pub const NOTHING_TO_REBALANCE: &str = "nothing to rebalance";

/// Counts reported by one rebalance sweep
#[derive(Debug, Clone, Serialize)]
pub struct RebalanceReport {
    /// Previously exhausted URLs that now succeeded
    pub rebalanced: usize,
    pub still_exhausted: usize,
    pub failed: usize,
    pub attempted: usize,
    pub credentials_used: usize,
    pub message: String,
    /// Per-URL results of the underlying run, if one happened
    pub summary: Option<DispatchSummary>,
}

impl RebalanceReport {
    fn nothing() -> Self {
        Self {
            rebalanced: 0,
            still_exhausted: 0,
            failed: 0,
            attempted: 0,
            credentials_used: 0,
            message: NOTHING_TO_REBALANCE.to_string(),
            summary: None,
        }
    }

    fn from_summary(summary: DispatchSummary) -> Self {
        let message = format!(
            "{} of {} url(s) rebalanced, {} still exhausted, {} failed",
            summary.succeeded, summary.total, summary.quota_exhausted, summary.failed
        );
        Self {
            rebalanced: summary.succeeded,
            still_exhausted: summary.quota_exhausted,
            failed: summary.failed,
            attempted: summary.total,
            credentials_used: summary.credentials_used(),
            message,
            summary: Some(summary),
        }
    }
}

/// Batch job over a project's quota-exhausted URLs
pub struct Rebalancer<'a> {
    dispatcher: &'a Dispatcher,
}

impl<'a> Rebalancer<'a> {
    pub fn new(dispatcher: &'a Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// URLs eligible for a rebalance, oldest first
    ///
    /// A URL qualifies only while its absolute latest row is an exhausted
    /// submit; a URL that succeeded since through another path does not.
    pub async fn candidates(&self, project: &Project) -> Result<Vec<BatchItem>> {
        let latest = self
            .dispatcher
            .store()
            .urls_with_latest_status(&project.id, OutcomeStatus::QuotaExhausted, Some(Operation::Submit))
            .await?;

        Ok(latest
            .into_iter()
            .map(|o| BatchItem {
                url: o.url,
                change_type: Some(o.change_type.unwrap_or_default()),
                replaces: Some(o.id),
            })
            .collect())
    }

    /// Run one sweep
    pub async fn run(&self, project: &Project) -> Result<RebalanceReport> {
        let candidates = self.candidates(project).await?;
        if candidates.is_empty() {
            log::info!("[rebalance] Project {}: {}", project.name, NOTHING_TO_REBALANCE);
            return Ok(RebalanceReport::nothing());
        }

        log::info!(
            "[rebalance] Project {}: replaying {} exhausted url(s)",
            project.name,
            candidates.len()
        );

        let summary = self
            .dispatcher
            .run(project, Operation::Submit, candidates)
            .await?;
        let report = RebalanceReport::from_summary(summary);

        log::info!("[rebalance] Project {}: {}", project.name, report.message);
        Ok(report)
    }
}
