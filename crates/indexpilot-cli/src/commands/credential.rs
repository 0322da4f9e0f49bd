//! Credential commands
//!
//! Service-account keys are registered per project; their order of
//! registration is the rotation order used by every dispatch run.

use anyhow::Result;
use clap::Subcommand;
use indexpilot_core::{CredentialPool, CredentialResponse};
use serde::Serialize;
use tabled::Tabled;

use super::{cell, Context};
use crate::output::{print_error, print_output, print_single, print_success};

#[derive(Subcommand)]
pub enum CredentialAction {
    /// Register a service-account key file
    Add {
        /// Project id or name
        #[arg(long, short)]
        project: String,

        /// Path to the service-account key JSON
        key_file: String,

        /// Search Console property this account is verified for, if it
        /// differs from the project's
        #[arg(long)]
        site: Option<String>,
    },

    /// List a project's credentials in rotation order
    List {
        /// Project id or name
        #[arg(long, short)]
        project: String,
    },

    /// Remove a credential
    Remove {
        /// Project id or name
        #[arg(long, short)]
        project: String,

        /// Service-account client email
        client_email: String,
    },
}

/// Credential row for table display (no key material)
#[derive(Debug, Serialize, Tabled)]
pub struct CredentialRow {
    #[tabled(rename = "#")]
    pub position: usize,
    #[tabled(rename = "Client Email")]
    pub client_email: String,
    #[tabled(rename = "Site")]
    pub site_url: String,
    #[tabled(rename = "Added")]
    pub created_at: String,
}

impl CredentialRow {
    fn new(position: usize, credential: CredentialResponse) -> Self {
        Self {
            position,
            client_email: credential.client_email,
            site_url: cell(credential.site_url.as_deref()),
            created_at: credential.created_at.format("%Y-%m-%d %H:%M").to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: CredentialAction) -> Result<()> {
    match action {
        CredentialAction::Add {
            project,
            key_file,
            site,
        } => add_credential(ctx, project, key_file, site).await,
        CredentialAction::List { project } => list_credentials(ctx, project).await,
        CredentialAction::Remove {
            project,
            client_email,
        } => remove_credential(ctx, project, client_email).await,
    }
}

async fn add_credential(
    ctx: &Context,
    project: String,
    key_file: String,
    site: Option<String>,
) -> Result<()> {
    let project = ctx.project(&project).await?;
    let path = shellexpand::tilde(&key_file).to_string();

    let pool = CredentialPool::new(ctx.db.pool.clone());
    let credential = pool
        .add_from_file(&project.id, std::path::Path::new(&path), site.as_deref())
        .await?;
    let position = pool.registered(&project.id).await?.len();

    print_success(
        &format!(
            "Added credential {} to {} (position {})",
            credential.client_email, project.name, position
        ),
        ctx.silent(),
    );
    print_single(
        &CredentialRow::new(position, CredentialResponse::from(credential)),
        ctx.format,
    )?;
    Ok(())
}

async fn list_credentials(ctx: &Context, project: String) -> Result<()> {
    let project = ctx.project(&project).await?;
    let rows: Vec<CredentialRow> = CredentialPool::new(ctx.db.pool.clone())
        .registered(&project.id)
        .await?
        .into_iter()
        .enumerate()
        .map(|(i, c)| CredentialRow::new(i + 1, CredentialResponse::from(c)))
        .collect();

    print_output(&rows, ctx.format)?;
    Ok(())
}

async fn remove_credential(ctx: &Context, project: String, client_email: String) -> Result<()> {
    let project = ctx.project(&project).await?;
    let removed = CredentialPool::new(ctx.db.pool.clone())
        .remove(&project.id, &client_email)
        .await?;

    if removed {
        print_success(
            &format!("Removed credential {} from {}", client_email, project.name),
            ctx.quiet,
        );
        Ok(())
    } else {
        print_error(&format!(
            "No credential {} registered for {}",
            client_email, project.name
        ));
        anyhow::bail!("credential not found")
    }
}
