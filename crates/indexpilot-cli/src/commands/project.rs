//! Project commands
//!
//! A project is one site with its own credentials and URL history.

use anyhow::Result;
use clap::Subcommand;
use indexpilot_core::{CredentialPool, Project, ProjectStore, ResultStore};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::{print_output, print_single, print_success};

#[derive(Subcommand)]
pub enum ProjectAction {
    /// Register a project
    Add {
        /// Project name
        name: String,

        /// Search Console property, e.g. sc-domain:example.com
        #[arg(long)]
        site: String,
    },

    /// List projects
    List,

    /// Show a project with URL status counts
    Show {
        /// Project id or name
        project: String,
    },
}

/// Project row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ProjectRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Site")]
    pub site_url: String,
    #[tabled(rename = "Credentials")]
    pub credentials: usize,
    #[tabled(rename = "Created")]
    pub created_at: String,
}

impl ProjectRow {
    fn new(project: Project, credentials: usize) -> Self {
        Self {
            id: project.id,
            name: project.name,
            site_url: project.site_url,
            credentials,
            created_at: project.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

/// Project detail with latest-status counts
#[derive(Debug, Serialize, Tabled)]
pub struct ProjectStatusRow {
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Site")]
    pub site_url: String,
    #[tabled(rename = "Credentials")]
    pub credentials: usize,
    #[tabled(rename = "URLs")]
    pub urls: usize,
    #[tabled(rename = "Success")]
    pub success: usize,
    #[tabled(rename = "Failed")]
    pub failed: usize,
    #[tabled(rename = "Quota Exhausted")]
    pub quota_exhausted: usize,
}

pub async fn execute(ctx: &Context, action: ProjectAction) -> Result<()> {
    match action {
        ProjectAction::Add { name, site } => add_project(ctx, name, site).await,
        ProjectAction::List => list_projects(ctx).await,
        ProjectAction::Show { project } => show_project(ctx, project).await,
    }
}

async fn add_project(ctx: &Context, name: String, site: String) -> Result<()> {
    let project = ProjectStore::new(ctx.db.pool.clone())
        .create(&name, &site)
        .await?;

    print_success(
        &format!("Added project: {} ({})", project.name, project.site_url),
        ctx.silent(),
    );
    print_single(&ProjectRow::new(project, 0), ctx.format)?;
    Ok(())
}

async fn list_projects(ctx: &Context) -> Result<()> {
    let projects = ProjectStore::new(ctx.db.pool.clone()).list().await?;
    let pool = CredentialPool::new(ctx.db.pool.clone());

    let mut rows = Vec::with_capacity(projects.len());
    for project in projects {
        let credentials = pool.registered(&project.id).await?.len();
        rows.push(ProjectRow::new(project, credentials));
    }

    print_output(&rows, ctx.format)?;
    Ok(())
}

async fn show_project(ctx: &Context, project: String) -> Result<()> {
    let project = ctx.project(&project).await?;
    let credentials = CredentialPool::new(ctx.db.pool.clone())
        .registered(&project.id)
        .await?
        .len();
    let counts = ResultStore::new(ctx.db.pool.clone())
        .status_counts(&project.id)
        .await?;

    let row = ProjectStatusRow {
        name: project.name,
        site_url: project.site_url,
        credentials,
        urls: counts.urls,
        success: counts.success,
        failed: counts.failed,
        quota_exhausted: counts.quota_exhausted,
    };
    print_single(&row, ctx.format)?;
    Ok(())
}
