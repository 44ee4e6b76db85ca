//! CLI integration tests
//!
//! Tests the sl-agent binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn sl_agent() -> Command {
    Command::cargo_bin("sl-agent")
        .expect("Failed to locate sl-agent binary - ensure it's built before running tests")
}

/// Empty config file so the user's own config never leaks into a test
fn empty_config(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("node.toml");
    std::fs::write(&path, "").unwrap();
    path
}

#[test]
fn test_cli_help() {
    sl_agent()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sl-agent"))
        .stdout(predicate::str::contains("--labels-file"))
        .stdout(predicate::str::contains("--retry-backoff-strategy"));
}

#[test]
fn test_cli_version() {
    sl_agent()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sl-agent"));
}

#[test]
fn test_invalid_url_is_rejected() {
    let dir = TempDir::new().unwrap();
    sl_agent()
        .arg("--config")
        .arg(empty_config(&dir))
        .args(["--url", "ftp://ci.example.com", "--", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_conflicting_tls_options_are_rejected() {
    let dir = TempDir::new().unwrap();
    sl_agent()
        .arg("--config")
        .arg(empty_config(&dir))
        .args([
            "--disable-ssl-verification",
            "--ssl-fingerprint",
            &"ab".repeat(32),
            "--",
            "true",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("mutually exclusive"));
}

#[test]
fn test_zero_retry_is_rejected() {
    let dir = TempDir::new().unwrap();
    sl_agent()
        .arg("--config")
        .arg(empty_config(&dir))
        .args(["--retry", "0", "--", "true"])
        .assert()
        .failure();
}

#[test]
fn test_missing_transport_command_is_rejected() {
    let dir = TempDir::new().unwrap();
    sl_agent()
        .arg("--config")
        .arg(empty_config(&dir))
        .args(["--url", "http://127.0.0.1:9/"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No transport command"));
}

#[test]
fn test_missing_explicit_config_is_fatal() {
    let dir = TempDir::new().unwrap();
    sl_agent()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}

#[test]
fn test_bad_tool_location_is_a_usage_error() {
    sl_agent()
        .args(["--tool-location", "maven"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("NAME=PATH"));
}

#[test]
fn test_unreachable_coordinator_exhausts_retries() {
    let dir = TempDir::new().unwrap();
    sl_agent()
        .arg("--config")
        .arg(empty_config(&dir))
        .args([
            "--url",
            "http://127.0.0.1:9/",
            "--retry",
            "1",
            "--disable-unique-id",
            "--",
            "true",
        ])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .code(1);
}
