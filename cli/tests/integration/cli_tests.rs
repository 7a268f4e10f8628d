//! Integration tests for the hoist command line surface.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn hoist() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hoist"));
    cmd.env("NO_COLOR", "1")
        .env_remove("HOIST_CONFIG")
        .env_remove("HOIST_HOST")
        .env_remove("RUST_LOG");
    cmd
}

// --- Help and version tests ---

#[test]
fn test_cli_no_args_shows_help_and_exits_two() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    hoist().assert().code(2).stderr(predicate::str::contains(
        "Push-style application deploys",
    ));
}

#[test]
fn test_cli_help_flag_shows_help() {
    hoist()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("version"));
}

#[test]
fn test_help_hides_remote_command() {
    hoist()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("_remote").not());
}

#[test]
fn test_remote_help_accessible_directly() {
    hoist()
        .args(["_remote", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CHECKSUM"));
}

#[test]
fn test_deploy_help_lists_overrides() {
    hoist()
        .args(["deploy", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--host"))
        .stdout(predicate::str::contains("--identity"))
        .stdout(predicate::str::contains("--no-tag"));
}

#[test]
fn test_cli_version_flag_shows_version() {
    hoist()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hoist"));
}

#[test]
fn test_version_command_shows_version() {
    hoist()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hoist v0.1.0"));
}

#[test]
fn test_version_command_json_outputs_valid_json() {
    let out = hoist()
        .args(["--json", "version"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).expect("valid JSON");
    assert_eq!(value["version"], "0.1.0");
}

#[test]
fn test_global_quiet_flag_silences_version() {
    hoist()
        .args(["--quiet", "version"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_no_color_env_accepts_any_truthy_value() {
    for value in ["1", "yes", "true"] {
        hoist()
            .env("NO_COLOR", value)
            .arg("version")
            .assert()
            .success()
            .stdout(predicate::str::contains("hoist v0.1.0"));
    }
}

#[test]
fn test_no_color_env_strips_ansi_from_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    hoist()
        .current_dir(dir.path())
        .env("NO_COLOR", "1")
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No target host configured"))
        .stderr(predicate::str::contains("\x1b[").not());
}

// --- Error handling tests ---

#[test]
fn test_unknown_command_exits_with_error() {
    hoist()
        .arg("nonexistent")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_deploy_without_host_fails_before_doing_anything() {
    let dir = tempfile::tempdir().expect("tempdir");
    hoist()
        .current_dir(dir.path())
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("No target host configured"));
    assert_eq!(
        std::fs::read_dir(dir.path()).expect("read").count(),
        0,
        "nothing may be written to the project"
    );
}

#[test]
fn test_deploy_json_error_carries_code() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = hoist()
        .current_dir(dir.path())
        .args(["--json", "deploy"])
        .assert()
        .code(1)
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&out).expect("valid JSON");
    assert_eq!(value["error"], true);
    assert_eq!(value["code"], "CONFIG_ERROR");
}

#[test]
fn test_unreadable_config_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("hoist.yaml"), "host: [unterminated\n").expect("write");
    hoist()
        .current_dir(dir.path())
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot read config"));
}

#[test]
fn test_invalid_signal_in_config_is_rejected_locally() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("hoist.yaml"),
        "host: app.example.com\nprocess:\n  signal: BOGUS\n",
    )
    .expect("write");
    hoist()
        .current_dir(dir.path())
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown signal 'BOGUS'"));
}

#[test]
fn test_hoist_config_env_selects_the_config_file() {
    let project = tempfile::tempdir().expect("tempdir");
    let elsewhere = tempfile::tempdir().expect("tempdir");
    let config = elsewhere.path().join("prod.yaml");
    std::fs::write(&config, "host: app.example.com\nprocess:\n  signal: NOPE\n").expect("write");
    hoist()
        .current_dir(project.path())
        .env("HOIST_CONFIG", &config)
        .arg("deploy")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown signal 'NOPE'"));
}
