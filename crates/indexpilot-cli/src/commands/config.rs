//! Config commands
//!
//! Configuration comes from the environment; this only reports it.

use anyhow::Result;
use clap::Subcommand;
use indexpilot_core::config::{ENV_INSPECT_CAP, ENV_PACING_MS, ENV_REQUEST_TIMEOUT_SECS, ENV_SUBMIT_CAP};
use indexpilot_core::db::{get_db_path, ENV_DB_PATH};
use serde::Serialize;
use tabled::Tabled;

use super::Context;
use crate::output::print_output;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
}

/// Config row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct ConfigRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Source")]
    pub source: String,
}

impl ConfigRow {
    fn new(key: &str, value: impl ToString) -> Self {
        let source = if std::env::var(key).is_ok() { "env" } else { "default" };
        Self {
            key: key.to_string(),
            value: value.to_string(),
            source: source.to_string(),
        }
    }
}

pub async fn execute(ctx: &Context, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => show_config(ctx),
    }
}

fn show_config(ctx: &Context) -> Result<()> {
    let db_path = get_db_path()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| "Unknown".to_string());

    let rows = vec![
        ConfigRow::new(ENV_DB_PATH, db_path),
        ConfigRow::new(ENV_SUBMIT_CAP, ctx.config.daily_submit_cap),
        ConfigRow::new(ENV_INSPECT_CAP, ctx.config.daily_inspect_cap),
        ConfigRow::new(ENV_PACING_MS, ctx.config.pacing_delay_ms),
        ConfigRow::new(ENV_REQUEST_TIMEOUT_SECS, ctx.config.request_timeout_secs),
    ];

    print_output(&rows, ctx.format)?;
    Ok(())
}
