//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod config;
pub mod credential;
pub mod dispatch;
pub mod project;
pub mod urls;

use anyhow::{Context as _, Result};
use indexpilot_core::{Database, DispatchConfig, Project, ProjectStore};

use crate::output::OutputFormat;

/// Shared context for all commands
pub struct Context {
    pub db: Database,
    pub config: DispatchConfig,
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Context {
    /// Resolve a project by id or name
    pub async fn project(&self, id_or_name: &str) -> Result<Project> {
        let project = ProjectStore::new(self.db.pool.clone())
            .find(id_or_name)
            .await?;
        Ok(project)
    }

    /// Whether progress messages are suppressed; JSON output stays clean
    pub fn silent(&self) -> bool {
        self.quiet || self.format == OutputFormat::Json
    }
}

/// Collect URLs from positional arguments and an optional list file
///
/// The file holds one URL per line; blank lines and `#` comments are
/// skipped. Cleaning beyond that (trim, dedupe, validation) happens in the
/// dispatcher.
pub fn collect_urls(args: Vec<String>, file: Option<&str>) -> Result<Vec<String>> {
    let mut urls = args;
    if let Some(path) = file {
        let expanded = shellexpand::tilde(path).to_string();
        let content = std::fs::read_to_string(&expanded)
            .with_context(|| format!("Failed to read URL list {}", expanded))?;
        urls.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    Ok(urls)
}

/// Shorten an optional cell for table output
pub fn cell(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_collect_urls_merges_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# sitemap export").unwrap();
        writeln!(file, "https://example.com/a").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  https://example.com/b  ").unwrap();

        let urls = collect_urls(
            vec!["https://example.com/first".to_string()],
            Some(file.path().to_str().unwrap()),
        )
        .unwrap();

        assert_eq!(
            urls,
            vec![
                "https://example.com/first",
                "https://example.com/a",
                "https://example.com/b",
            ]
        );
    }

    #[test]
    fn test_collect_urls_missing_file() {
        let err = collect_urls(Vec::new(), Some("/nonexistent/urls.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read URL list"));
    }

    #[test]
    fn test_cell() {
        assert_eq!(cell(Some("PASS")), "PASS");
        assert_eq!(cell(None), "-");
    }
}
