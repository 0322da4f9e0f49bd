//! Outcome storage layer
//!
//! Persists one row per external call attempt in `indexing_requests` and
//! answers the "latest status per url" questions asked by the inventory
//! view, retry and the rebalancer.
//!
//! The log is append-only with one exception: a rebalance success flips
//! the still-`quota_exhausted` row to `success` in place
//! ([`ResultStore::mark_rebalanced`]).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, SqlitePool};

use crate::error::Result;
use crate::models::{
    DispatchOutcome, InspectionRecord, InventoryItem, Operation, OutcomeRow, OutcomeStatus,
    StoredInspection,
};
use crate::utils::db_timestamp;

/// Columns selected for every outcome query
const OUTCOME_COLUMNS: &str = "id, project_id, url, operation, change_type, credential_id, \
                               status, reason, response_code, created_at, updated_at";

// ============================================================================
// Row Types
// ============================================================================

/// Database row representation of `url_inspections`
#[derive(Debug, Clone, FromRow)]
struct InspectionRow {
    project_id: String,
    url: String,
    verdict: Option<String>,
    coverage_state: Option<String>,
    indexing_state: Option<String>,
    page_fetch_state: Option<String>,
    crawled_as: Option<String>,
    last_crawl_time: Option<String>,
    referring_urls: Option<String>,
    sitemaps: Option<String>,
    inspected_at: DateTime<Utc>,
}

impl InspectionRow {
    fn into_stored(self) -> StoredInspection {
        StoredInspection {
            project_id: self.project_id,
            url: self.url,
            record: InspectionRecord {
                verdict: self.verdict,
                coverage_state: self.coverage_state,
                indexing_state: self.indexing_state,
                page_fetch_state: self.page_fetch_state,
                crawled_as: self.crawled_as,
                last_crawl_time: self.last_crawl_time,
                referring_urls: parse_json_list(self.referring_urls.as_deref()),
                sitemaps: parse_json_list(self.sitemaps.as_deref()),
            },
            inspected_at: self.inspected_at,
        }
    }
}

fn parse_json_list(raw: Option<&str>) -> Vec<String> {
    match raw {
        Some(s) => serde_json::from_str(s).unwrap_or_else(|e| {
            log::warn!("[store] Ignoring malformed JSON list {:?}: {}", s, e);
            Vec::new()
        }),
        None => Vec::new(),
    }
}

fn into_outcomes(rows: Vec<OutcomeRow>) -> Vec<DispatchOutcome> {
    rows.iter()
        .filter_map(|row| {
            let outcome = row.to_outcome();
            if outcome.is_none() {
                log::warn!("[store] Skipping unreadable outcome row {}", row.id);
            }
            outcome
        })
        .collect()
}

/// Counts of URLs by their latest outcome status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub urls: usize,
    pub success: usize,
    pub failed: usize,
    pub quota_exhausted: usize,
}

// ============================================================================
// ResultStore
// ============================================================================

/// Storage layer for dispatch outcomes, inspections and the URL inventory
#[derive(Clone)]
pub struct ResultStore {
    pool: SqlitePool,
}

impl ResultStore {
    /// Create a new ResultStore with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one outcome row and register its URL as known
    pub async fn record(&self, outcome: &DispatchOutcome) -> Result<()> {
        let created_at = db_timestamp(&outcome.created_at);

        sqlx::query(
            r#"
            INSERT INTO indexing_requests
            (id, project_id, url, operation, change_type, credential_id, status,
             reason, response_code, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&outcome.id)
        .bind(&outcome.project_id)
        .bind(&outcome.url)
        .bind(outcome.operation.to_string())
        .bind(outcome.change_type.map(|ct| ct.as_str()))
        .bind(&outcome.credential_id)
        .bind(outcome.status.as_str())
        .bind(&outcome.reason)
        .bind(outcome.response_code)
        .bind(&created_at)
        .bind(db_timestamp(&outcome.updated_at))
        .execute(&self.pool)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO known_urls (project_id, url, added_at) VALUES (?, ?, ?)")
            .bind(&outcome.project_id)
            .bind(&outcome.url)
            .bind(&created_at)
            .execute(&self.pool)
            .await?;

        log::debug!(
            "[store] Recorded {} {} for {} ({})",
            outcome.operation,
            outcome.status,
            outcome.url,
            outcome.id
        );

        Ok(())
    }

    /// Flip a still-`quota_exhausted` row to `success` in place
    ///
    /// Only the status, credential, reason, response code and `updated_at`
    /// change. Returns `false` if the row no longer exists or is no longer
    /// `quota_exhausted`, in which case nothing is written.
    pub async fn mark_rebalanced(&self, row_id: &str, success: &DispatchOutcome) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE indexing_requests
            SET status = ?, credential_id = ?, reason = NULL, response_code = ?, updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(OutcomeStatus::Success.as_str())
        .bind(&success.credential_id)
        .bind(success.response_code)
        .bind(db_timestamp(&success.updated_at))
        .bind(row_id)
        .bind(OutcomeStatus::QuotaExhausted.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Fetch one outcome by id
    pub async fn get(&self, outcome_id: &str) -> Result<Option<DispatchOutcome>> {
        let row = sqlx::query_as::<_, OutcomeRow>(&format!(
            "SELECT {} FROM indexing_requests WHERE id = ?",
            OUTCOME_COLUMNS
        ))
        .bind(outcome_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.and_then(|r| r.to_outcome()))
    }

    /// Latest outcome for every URL of a project
    ///
    /// Latest means maximum `created_at`, ties broken by insertion order.
    /// With `operation` set only rows of that operation are considered.
    pub async fn latest_status_per_url(
        &self,
        project_id: &str,
        operation: Option<Operation>,
    ) -> Result<HashMap<String, DispatchOutcome>> {
        let op = operation.map(|o| o.to_string());
        let rows = sqlx::query_as::<_, OutcomeRow>(&format!(
            r#"
            SELECT {cols} FROM (
                SELECT r.*, ROW_NUMBER() OVER (
                    PARTITION BY r.url ORDER BY r.created_at DESC, r.rowid DESC
                ) AS rn
                FROM indexing_requests r
                WHERE r.project_id = ? AND (? IS NULL OR r.operation = ?)
            )
            WHERE rn = 1
            "#,
            cols = OUTCOME_COLUMNS
        ))
        .bind(project_id)
        .bind(&op)
        .bind(&op)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_outcomes(rows)
            .into_iter()
            .map(|o| (o.url.clone(), o))
            .collect())
    }

    /// URLs whose absolute latest row (across operations) has `status`
    ///
    /// Returns that latest row per URL, oldest first. With `operation` set,
    /// URLs whose latest row belongs to another operation are left out.
    pub async fn urls_with_latest_status(
        &self,
        project_id: &str,
        status: OutcomeStatus,
        operation: Option<Operation>,
    ) -> Result<Vec<DispatchOutcome>> {
        let op = operation.map(|o| o.to_string());
        let rows = sqlx::query_as::<_, OutcomeRow>(&format!(
            r#"
            SELECT {cols} FROM (
                SELECT r.*, r.rowid AS seq, ROW_NUMBER() OVER (
                    PARTITION BY r.url ORDER BY r.created_at DESC, r.rowid DESC
                ) AS rn
                FROM indexing_requests r
                WHERE r.project_id = ?
            )
            WHERE rn = 1 AND status = ? AND (? IS NULL OR operation = ?)
            ORDER BY created_at ASC, seq ASC
            "#,
            cols = OUTCOME_COLUMNS
        ))
        .bind(project_id)
        .bind(status.as_str())
        .bind(&op)
        .bind(&op)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_outcomes(rows))
    }

    /// Outcome history, newest first
    pub async fn history(
        &self,
        project_id: &str,
        url: Option<&str>,
        limit: u32,
    ) -> Result<Vec<DispatchOutcome>> {
        let rows = sqlx::query_as::<_, OutcomeRow>(&format!(
            r#"
            SELECT {cols} FROM indexing_requests
            WHERE project_id = ? AND (? IS NULL OR url = ?)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?
            "#,
            cols = OUTCOME_COLUMNS
        ))
        .bind(project_id)
        .bind(url)
        .bind(url)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(into_outcomes(rows))
    }

    /// URLs whose latest submit is `quota_exhausted` while a later
    /// inspection is their latest row overall
    ///
    /// Rebalance skips these, so they only get another crawl notification
    /// from an explicit submit.
    pub async fn masked_exhausted_submits(&self, project_id: &str) -> Result<Vec<String>> {
        let submits = self
            .latest_status_per_url(project_id, Some(Operation::Submit))
            .await?;
        let latest = self.latest_status_per_url(project_id, None).await?;

        let mut urls: Vec<String> = submits
            .into_values()
            .filter(|s| s.status == OutcomeStatus::QuotaExhausted)
            .filter(|s| latest.get(&s.url).is_some_and(|l| l.id != s.id))
            .map(|s| s.url)
            .collect();
        urls.sort();
        Ok(urls)
    }

    /// Counts of URLs grouped by their latest outcome
    pub async fn status_counts(&self, project_id: &str) -> Result<StatusCounts> {
        let latest = self.latest_status_per_url(project_id, None).await?;
        let mut counts = StatusCounts {
            urls: latest.len(),
            ..Default::default()
        };
        for outcome in latest.values() {
            match outcome.status {
                OutcomeStatus::Success => counts.success += 1,
                OutcomeStatus::Failed => counts.failed += 1,
                OutcomeStatus::QuotaExhausted => counts.quota_exhausted += 1,
            }
        }
        Ok(counts)
    }

    /// Register URLs in the project's inventory
    ///
    /// Returns how many were new.
    pub async fn add_known_urls(&self, project_id: &str, urls: &[String]) -> Result<u64> {
        let added_at = db_timestamp(&Utc::now());
        let mut added = 0;
        for url in urls {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO known_urls (project_id, url, added_at) VALUES (?, ?, ?)",
            )
            .bind(project_id)
            .bind(url)
            .bind(&added_at)
            .execute(&self.pool)
            .await?;
            added += result.rows_affected();
        }
        Ok(added)
    }

    /// Insert or replace the inspection result of one URL
    pub async fn upsert_inspection(
        &self,
        project_id: &str,
        url: &str,
        record: &InspectionRecord,
        inspected_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO url_inspections
            (project_id, url, verdict, coverage_state, indexing_state, page_fetch_state,
             crawled_as, last_crawl_time, referring_urls, sitemaps, inspected_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(project_id, url) DO UPDATE SET
                verdict = excluded.verdict,
                coverage_state = excluded.coverage_state,
                indexing_state = excluded.indexing_state,
                page_fetch_state = excluded.page_fetch_state,
                crawled_as = excluded.crawled_as,
                last_crawl_time = excluded.last_crawl_time,
                referring_urls = excluded.referring_urls,
                sitemaps = excluded.sitemaps,
                inspected_at = excluded.inspected_at
            "#,
        )
        .bind(project_id)
        .bind(url)
        .bind(&record.verdict)
        .bind(&record.coverage_state)
        .bind(&record.indexing_state)
        .bind(&record.page_fetch_state)
        .bind(&record.crawled_as)
        .bind(&record.last_crawl_time)
        .bind(serde_json::to_string(&record.referring_urls)?)
        .bind(serde_json::to_string(&record.sitemaps)?)
        .bind(db_timestamp(&inspected_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stored inspection result of one URL
    pub async fn get_inspection(
        &self,
        project_id: &str,
        url: &str,
    ) -> Result<Option<StoredInspection>> {
        let row = sqlx::query_as::<_, InspectionRow>(
            r#"
            SELECT project_id, url, verdict, coverage_state, indexing_state, page_fetch_state,
                   crawled_as, last_crawl_time, referring_urls, sitemaps, inspected_at
            FROM url_inspections
            WHERE project_id = ? AND url = ?
            "#,
        )
        .bind(project_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(InspectionRow::into_stored))
    }

    /// Known URLs joined with their latest outcome and inspection
    pub async fn inventory(&self, project_id: &str) -> Result<Vec<InventoryItem>> {
        let items = sqlx::query_as::<_, InventoryItem>(
            r#"
            WITH latest AS (
                SELECT url, operation, status, reason, credential_id, created_at,
                       ROW_NUMBER() OVER (
                           PARTITION BY url ORDER BY created_at DESC, rowid DESC
                       ) AS rn
                FROM indexing_requests
                WHERE project_id = ?
            )
            SELECT k.url AS url,
                   k.added_at AS added_at,
                   l.operation AS last_operation,
                   l.status AS last_status,
                   l.reason AS last_reason,
                   l.credential_id AS last_credential,
                   l.created_at AS last_attempt_at,
                   i.verdict AS verdict,
                   i.coverage_state AS coverage_state,
                   i.indexing_state AS indexing_state,
                   i.last_crawl_time AS last_crawl_time,
                   i.inspected_at AS inspected_at
            FROM known_urls k
            LEFT JOIN latest l ON l.url = k.url AND l.rn = 1
            LEFT JOIN url_inspections i ON i.project_id = k.project_id AND i.url = k.url
            WHERE k.project_id = ?
            ORDER BY k.added_at ASC, k.url ASC
            "#,
        )
        .bind(project_id)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }
}
