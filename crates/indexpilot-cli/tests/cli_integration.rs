//! Integration tests for indexpilot-cli
//!
//! These tests verify the CLI commands work end-to-end against a temporary
//! database. Nothing here reaches Google; only commands that stop before a
//! network call are exercised.
//! Tests run serially to avoid database lock conflicts.

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::TempDir;

/// Get a Command for the indexpilot binary bound to a temp database
fn indexpilot(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("indexpilot").unwrap();
    cmd.env("INDEXPILOT_DB_PATH", dir.path().join("indexpilot.db"))
        .env_remove("RUST_LOG");
    cmd
}

const KEY_JSON: &str = r#"{
  "type": "service_account",
  "client_email": "a@acme.iam.gserviceaccount.com",
  "private_key": "not a pem",
  "token_uri": "https://oauth2.googleapis.com/token"
}"#;

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
#[serial]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    indexpilot(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("indexpilot"))
        .stdout(predicate::str::contains("rebalance"));
}

#[test]
#[serial]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    indexpilot(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("indexpilot"));
}

#[test]
#[serial]
fn test_submit_help() {
    let dir = TempDir::new().unwrap();
    indexpilot(&dir)
        .args(["submit", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--type"))
        .stdout(predicate::str::contains("--file"));
}

// =============================================================================
// Project Command Tests
// =============================================================================

#[test]
#[serial]
fn test_project_add_and_list() {
    let dir = TempDir::new().unwrap();

    indexpilot(&dir)
        .args(["project", "add", "acme", "--site", "sc-domain:example.com"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added project: acme"));

    indexpilot(&dir)
        .args(["project", "list", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"name\": \"acme\""))
        .stdout(predicate::str::contains("sc-domain:example.com"));
}

#[test]
#[serial]
fn test_project_add_duplicate_fails() {
    let dir = TempDir::new().unwrap();

    indexpilot(&dir)
        .args(["project", "add", "acme", "--site", "sc-domain:example.com"])
        .assert()
        .success();

    indexpilot(&dir)
        .args(["project", "add", "acme", "--site", "sc-domain:example.com"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
#[serial]
fn test_unknown_project() {
    let dir = TempDir::new().unwrap();
    indexpilot(&dir)
        .args(["credential", "list", "--project", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

// =============================================================================
// Credential & Dispatch Tests
// =============================================================================

#[test]
#[serial]
fn test_credential_add_rejects_unusable_key() {
    let dir = TempDir::new().unwrap();
    let key_path = dir.path().join("key.json");
    std::fs::write(&key_path, KEY_JSON).unwrap();

    indexpilot(&dir)
        .args(["project", "add", "acme", "--site", "sc-domain:example.com"])
        .assert()
        .success();

    indexpilot(&dir)
        .args(["credential", "add", "--project", "acme"])
        .arg(&key_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unusable private_key"));
}

#[test]
#[serial]
fn test_submit_without_credentials() {
    let dir = TempDir::new().unwrap();

    indexpilot(&dir)
        .args(["project", "add", "acme", "--site", "sc-domain:example.com"])
        .assert()
        .success();

    indexpilot(&dir)
        .args(["submit", "--project", "acme", "https://example.com/a"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No credential configured"));
}

#[test]
#[serial]
fn test_rebalance_with_nothing_to_do() {
    let dir = TempDir::new().unwrap();

    indexpilot(&dir)
        .args(["project", "add", "acme", "--site", "sc-domain:example.com"])
        .assert()
        .success();

    indexpilot(&dir)
        .args(["rebalance", "--project", "acme"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to rebalance"));
}

// =============================================================================
// URL Inventory Tests
// =============================================================================

#[test]
#[serial]
fn test_urls_add_and_inventory() {
    let dir = TempDir::new().unwrap();

    indexpilot(&dir)
        .args(["project", "add", "acme", "--site", "sc-domain:example.com"])
        .assert()
        .success();

    indexpilot(&dir)
        .args([
            "urls",
            "add",
            "--project",
            "acme",
            "https://example.com/a",
            "https://example.com/a",
            "not-a-url",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added 1 new url(s)"))
        .stderr(predicate::str::contains("Skipping invalid url: not-a-url"));

    indexpilot(&dir)
        .args(["urls", "inventory", "--project", "acme", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("https://example.com/a"));
}

// =============================================================================
// Config Tests
// =============================================================================

#[test]
#[serial]
fn test_config_show() {
    let dir = TempDir::new().unwrap();
    indexpilot(&dir)
        .args(["config", "show"])
        .env("INDEXPILOT_SUBMIT_CAP", "150")
        .assert()
        .success()
        .stdout(predicate::str::contains("INDEXPILOT_SUBMIT_CAP"))
        .stdout(predicate::str::contains("150"));
}

#[test]
#[serial]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    indexpilot(&dir)
        .args(["config", "show"])
        .env("INDEXPILOT_SUBMIT_CAP", "0")
        .assert()
        .failure();
}
