//! Dispatch commands: submit, inspect, rebalance, retry
//!
//! Each invocation is one dispatch run against Google's Indexing and URL
//! Inspection APIs using the project's registered service accounts.

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use indexpilot_core::services::CredentialUsage;
use indexpilot_core::{
    ChangeType, CredentialPool, DispatchSummary, Dispatcher, GoogleIndexingClient, Rebalancer,
    ResultStore, ServiceAccountTokenSource, UrlResult,
};
use serde::Serialize;
use tabled::Tabled;

use super::{cell, collect_urls, Context};
use crate::output::{print_error, print_info, print_json, print_output, print_warning, OutputFormat};

#[derive(Args)]
pub struct SubmitArgs {
    /// Project id or name
    #[arg(long, short)]
    pub project: String,

    /// URLs to submit
    pub urls: Vec<String>,

    /// File with one URL per line
    #[arg(long)]
    pub file: Option<String>,

    /// Notification type: URL_UPDATED or URL_DELETED
    #[arg(long = "type", default_value = "URL_UPDATED")]
    pub change_type: ChangeType,
}

#[derive(Args)]
pub struct InspectArgs {
    /// Project id or name
    #[arg(long, short)]
    pub project: String,

    /// URLs to inspect
    pub urls: Vec<String>,

    /// File with one URL per line
    #[arg(long)]
    pub file: Option<String>,

    /// Inspect every URL in the project's inventory
    #[arg(long, conflicts_with_all = ["urls", "file"])]
    pub all: bool,
}

#[derive(Args)]
pub struct RebalanceArgs {
    /// Project id or name
    #[arg(long, short)]
    pub project: String,

    /// List the URLs that would be replayed without calling the API
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct RetryArgs {
    /// Project id or name
    #[arg(long, short)]
    pub project: String,

    /// Outcome id (see `urls history`)
    pub outcome_id: String,
}

/// Per-URL result row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ResultRow {
    #[tabled(rename = "URL")]
    pub url: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Credential")]
    pub credential: String,
    #[tabled(rename = "Code")]
    pub code: String,
    #[tabled(rename = "Reason")]
    pub reason: String,
}

impl From<&UrlResult> for ResultRow {
    fn from(result: &UrlResult) -> Self {
        let status = if result.updated_in_place {
            format!("{} (rebalanced)", result.status)
        } else {
            result.status.to_string()
        };
        Self {
            url: result.url.clone(),
            status,
            credential: cell(result.credential_id.as_deref()),
            code: result
                .response_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string()),
            reason: cell(result.reason.as_deref()),
        }
    }
}

/// Build a dispatcher wired to Google's endpoints
fn dispatcher(ctx: &Context) -> Result<Dispatcher> {
    let timeout = ctx.config.request_timeout();
    let tokens = Arc::new(ServiceAccountTokenSource::new(timeout)?);
    let provider = Arc::new(GoogleIndexingClient::new(timeout)?);

    Ok(Dispatcher::new(
        CredentialPool::new(ctx.db.pool.clone()),
        ResultStore::new(ctx.db.pool.clone()),
        tokens,
        provider,
        ctx.config.clone(),
    ))
}

pub async fn submit(ctx: &Context, args: SubmitArgs) -> Result<()> {
    let project = ctx.project(&args.project).await?;
    let urls = collect_urls(args.urls, args.file.as_deref())?;
    if urls.is_empty() {
        anyhow::bail!("no urls given; pass urls or --file");
    }

    print_info(
        &format!(
            "Submitting {} url(s) for {} as {}...",
            urls.len(),
            project.name,
            args.change_type
        ),
        ctx.silent(),
    );

    let summary = dispatcher(ctx)?
        .submit(&project, &urls, args.change_type)
        .await
        .map_err(aborted)?;
    print_summary(ctx, &summary)
}

pub async fn inspect(ctx: &Context, args: InspectArgs) -> Result<()> {
    let project = ctx.project(&args.project).await?;
    let urls = if args.all {
        ResultStore::new(ctx.db.pool.clone())
            .inventory(&project.id)
            .await?
            .into_iter()
            .map(|item| item.url)
            .collect()
    } else {
        collect_urls(args.urls, args.file.as_deref())?
    };
    if urls.is_empty() {
        anyhow::bail!("no urls given; pass urls, --file or --all");
    }

    print_info(
        &format!("Inspecting {} url(s) for {}...", urls.len(), project.name),
        ctx.silent(),
    );

    let summary = dispatcher(ctx)?
        .inspect(&project, &urls)
        .await
        .map_err(aborted)?;
    print_summary(ctx, &summary)
}

pub async fn rebalance(ctx: &Context, args: RebalanceArgs) -> Result<()> {
    let project = ctx.project(&args.project).await?;
    let dispatcher = dispatcher(ctx)?;
    let rebalancer = Rebalancer::new(&dispatcher);

    if args.dry_run {
        let urls: Vec<String> = rebalancer
            .candidates(&project)
            .await?
            .into_iter()
            .map(|item| item.url)
            .collect();
        match ctx.format {
            OutputFormat::Json => print_json(&urls)?,
            OutputFormat::Table => {
                for url in &urls {
                    println!("{}", url);
                }
                print_info(&format!("{} url(s) eligible", urls.len()), ctx.quiet);
            }
        }
        return Ok(());
    }

    let report = rebalancer.run(&project).await.map_err(aborted)?;
    match ctx.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Table => {
            if let Some(summary) = &report.summary {
                print_results(summary)?;
                print_usage(&summary.credentials, ctx.quiet);
            }
            print_info(&report.message, ctx.quiet);
        }
    }
    Ok(())
}

pub async fn retry(ctx: &Context, args: RetryArgs) -> Result<()> {
    let project = ctx.project(&args.project).await?;
    let summary = dispatcher(ctx)?
        .retry(&project, &args.outcome_id)
        .await
        .map_err(aborted)?;
    print_summary(ctx, &summary)
}

/// Flag run-level failures, which leave no outcome rows behind
fn aborted(err: indexpilot_core::Error) -> anyhow::Error {
    if err.is_fatal_dispatch() {
        print_error("Run aborted before any url was dispatched.");
    }
    err.into()
}

fn print_summary(ctx: &Context, summary: &DispatchSummary) -> Result<()> {
    match ctx.format {
        OutputFormat::Json => print_json(summary)?,
        OutputFormat::Table => {
            print_results(summary)?;
            print_usage(&summary.credentials, ctx.quiet);
            print_info(
                &format!(
                    "{} url(s): {} succeeded, {} failed, {} quota exhausted ({} call(s))",
                    summary.total,
                    summary.succeeded,
                    summary.failed,
                    summary.quota_exhausted,
                    summary.calls
                ),
                ctx.quiet,
            );
            if summary.not_submitted > 0 {
                print_warning(
                    &format!(
                        "{} url(s) exceeded today's capacity and were not submitted; run `indexpilot rebalance` later",
                        summary.not_submitted
                    ),
                    ctx.quiet,
                );
            }
        }
    }
    Ok(())
}

fn print_results(summary: &DispatchSummary) -> Result<()> {
    let rows: Vec<ResultRow> = summary.results.iter().map(ResultRow::from).collect();
    print_output(&rows, OutputFormat::Table)
}

fn print_usage(usage: &[CredentialUsage], quiet: bool) {
    for credential in usage {
        let state = if credential.exhausted { ", exhausted" } else { "" };
        print_info(
            &format!("  {}: {} call(s){}", credential.credential_id, credential.used, state),
            quiet,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexpilot_core::OutcomeStatus;

    fn result(status: OutcomeStatus) -> UrlResult {
        UrlResult {
            url: "https://example.com/a".to_string(),
            status,
            credential_id: None,
            reason: None,
            response_code: None,
            outcome_id: "row-1".to_string(),
            attempted: false,
            updated_in_place: false,
        }
    }

    #[test]
    fn test_result_row_placeholders() {
        let row = ResultRow::from(&result(OutcomeStatus::QuotaExhausted));
        assert_eq!(row.status, "quota_exhausted");
        assert_eq!(row.credential, "-");
        assert_eq!(row.code, "-");
    }

    #[test]
    fn test_result_row_marks_rebalanced() {
        let mut success = result(OutcomeStatus::Success);
        success.updated_in_place = true;
        success.response_code = Some(200);
        success.credential_id = Some("b@acme.iam.gserviceaccount.com".to_string());

        let row = ResultRow::from(&success);
        assert_eq!(row.status, "success (rebalanced)");
        assert_eq!(row.code, "200");
        assert_eq!(row.credential, "b@acme.iam.gserviceaccount.com");
    }
}
