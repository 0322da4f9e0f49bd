//! indexpilot CLI - quota-aware search indexing requests
//!
//! A command-line interface for registering projects and service-account
//! credentials, submitting and inspecting URLs, and rebalancing URLs that
//! ran out of quota.

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "indexpilot")]
#[command(author, version, about = "Quota-aware indexing request CLI", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format: table (default) or json
    #[arg(long, global = true, default_value = "table")]
    format: output::OutputFormat,

    /// Suppress progress messages
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log dispatch progress (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Override database path (or set INDEXPILOT_DB_PATH env var)
    #[arg(long, env = "INDEXPILOT_DB_PATH", global = true)]
    db: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage projects (one per site)
    Project {
        #[command(subcommand)]
        action: commands::project::ProjectAction,
    },

    /// Manage service-account credentials
    Credential {
        #[command(subcommand)]
        action: commands::credential::CredentialAction,
    },

    /// Manage the URL inventory
    Urls {
        #[command(subcommand)]
        action: commands::urls::UrlsAction,
    },

    /// Submit URLs for crawling
    Submit(commands::dispatch::SubmitArgs),

    /// Inspect the index status of URLs
    Inspect(commands::dispatch::InspectArgs),

    /// Replay URLs whose latest submit ran out of quota
    Rebalance(commands::dispatch::RebalanceArgs),

    /// Re-issue one recorded outcome
    Retry(commands::dispatch::RetryArgs),

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    // Set up database path if provided
    if let Some(db_path) = &cli.db {
        std::env::set_var(indexpilot_core::db::ENV_DB_PATH, db_path);
    }

    // Initialize database
    let db = indexpilot_core::Database::new().await?;
    let config = indexpilot_core::DispatchConfig::from_env()?;

    // Create context for commands
    let ctx = commands::Context {
        db,
        config,
        format: cli.format,
        quiet: cli.quiet,
    };

    // Execute command
    match cli.command {
        Commands::Project { action } => commands::project::execute(&ctx, action).await,
        Commands::Credential { action } => commands::credential::execute(&ctx, action).await,
        Commands::Urls { action } => commands::urls::execute(&ctx, action).await,
        Commands::Submit(args) => commands::dispatch::submit(&ctx, args).await,
        Commands::Inspect(args) => commands::dispatch::inspect(&ctx, args).await,
        Commands::Rebalance(args) => commands::dispatch::rebalance(&ctx, args).await,
        Commands::Retry(args) => commands::dispatch::retry(&ctx, args).await,
        Commands::Config { action } => commands::config::execute(&ctx, action).await,
    }
}
