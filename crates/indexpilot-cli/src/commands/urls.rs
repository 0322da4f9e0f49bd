//! URL inventory commands

use anyhow::Result;
use clap::Subcommand;
use indexpilot_core::utils::normalize_urls;
use indexpilot_core::{DispatchOutcome, InventoryItem, OutcomeStatus, ResultStore};
use serde::Serialize;
use tabled::Tabled;

use super::{cell, collect_urls, Context};
use crate::output::{print_rows_or_json, print_success, print_warning};

#[derive(Subcommand)]
pub enum UrlsAction {
    /// Add URLs to the project's inventory without submitting them
    Add {
        /// Project id or name
        #[arg(long, short)]
        project: String,

        /// URLs to add
        urls: Vec<String>,

        /// File with one URL per line
        #[arg(long)]
        file: Option<String>,
    },

    /// Known URLs with their latest outcome and index status
    Inventory {
        /// Project id or name
        #[arg(long, short)]
        project: String,

        /// Only URLs whose latest outcome has this status
        /// (success, failed, quota_exhausted)
        #[arg(long)]
        status: Option<OutcomeStatus>,
    },

    /// Recorded outcomes, newest first
    History {
        /// Project id or name
        #[arg(long, short)]
        project: String,

        /// Only outcomes for this URL
        #[arg(long)]
        url: Option<String>,

        /// Maximum rows
        #[arg(long, default_value = "50")]
        limit: u32,
    },
}

/// Inventory row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct InventoryRow {
    #[tabled(rename = "URL")]
    pub url: String,
    #[tabled(rename = "Last Op")]
    pub last_operation: String,
    #[tabled(rename = "Status")]
    pub last_status: String,
    #[tabled(rename = "Credential")]
    pub last_credential: String,
    #[tabled(rename = "Verdict")]
    pub verdict: String,
    #[tabled(rename = "Coverage")]
    pub coverage_state: String,
    #[tabled(rename = "Last Crawl")]
    pub last_crawl_time: String,
}

impl From<&InventoryItem> for InventoryRow {
    fn from(item: &InventoryItem) -> Self {
        Self {
            url: item.url.clone(),
            last_operation: cell(item.last_operation.as_deref()),
            last_status: cell(item.last_status.as_deref()),
            last_credential: cell(item.last_credential.as_deref()),
            verdict: cell(item.verdict.as_deref()),
            coverage_state: cell(item.coverage_state.as_deref()),
            last_crawl_time: cell(item.last_crawl_time.as_deref()),
        }
    }
}

/// History row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct HistoryRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "When")]
    pub created_at: String,
    #[tabled(rename = "URL")]
    pub url: String,
    #[tabled(rename = "Op")]
    pub operation: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Credential")]
    pub credential: String,
    #[tabled(rename = "Reason")]
    pub reason: String,
}

impl From<&DispatchOutcome> for HistoryRow {
    fn from(outcome: &DispatchOutcome) -> Self {
        Self {
            id: outcome.id.clone(),
            created_at: outcome.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            url: outcome.url.clone(),
            operation: outcome.operation.to_string(),
            status: outcome.status.to_string(),
            credential: cell(outcome.credential_id.as_deref()),
            reason: cell(outcome.reason.as_deref()),
        }
    }
}

pub async fn execute(ctx: &Context, action: UrlsAction) -> Result<()> {
    match action {
        UrlsAction::Add { project, urls, file } => add_urls(ctx, project, urls, file).await,
        UrlsAction::Inventory { project, status } => show_inventory(ctx, project, status).await,
        UrlsAction::History {
            project,
            url,
            limit,
        } => show_history(ctx, project, url, limit).await,
    }
}

async fn add_urls(
    ctx: &Context,
    project: String,
    urls: Vec<String>,
    file: Option<String>,
) -> Result<()> {
    let project = ctx.project(&project).await?;
    let cleaned = normalize_urls(collect_urls(urls, file.as_deref())?);

    for invalid in &cleaned.invalid {
        print_warning(&format!("Skipping invalid url: {}", invalid), ctx.quiet);
    }

    let added = ResultStore::new(ctx.db.pool.clone())
        .add_known_urls(&project.id, &cleaned.valid)
        .await?;

    print_success(
        &format!(
            "Added {} new url(s) to {} ({} already known)",
            added,
            project.name,
            cleaned.valid.len() as u64 - added
        ),
        ctx.quiet,
    );
    Ok(())
}

async fn show_inventory(
    ctx: &Context,
    project: String,
    status: Option<OutcomeStatus>,
) -> Result<()> {
    let project = ctx.project(&project).await?;
    let store = ResultStore::new(ctx.db.pool.clone());
    let mut items = store.inventory(&project.id).await?;

    let masked = store.masked_exhausted_submits(&project.id).await?;
    if !masked.is_empty() {
        print_warning(
            &format!(
                "{} url(s) have a quota-exhausted submit behind a later inspection; rebalance skips them, submit again to notify Google: {}",
                masked.len(),
                masked.join(", ")
            ),
            ctx.quiet,
        );
    }

    if let Some(status) = status {
        items.retain(|item| item.last_status.as_deref() == Some(status.as_str()));
    }

    let rows: Vec<InventoryRow> = items.iter().map(InventoryRow::from).collect();
    print_rows_or_json(&rows, &items, ctx.format)?;
    Ok(())
}

async fn show_history(
    ctx: &Context,
    project: String,
    url: Option<String>,
    limit: u32,
) -> Result<()> {
    let project = ctx.project(&project).await?;
    let outcomes = ResultStore::new(ctx.db.pool.clone())
        .history(&project.id, url.as_deref(), limit)
        .await?;

    let rows: Vec<HistoryRow> = outcomes.iter().map(HistoryRow::from).collect();
    print_rows_or_json(&rows, &outcomes, ctx.format)?;
    Ok(())
}
