//! Exit codes of the `hostguard` binary

use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn hostguard(dir: &TempDir, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hostguard"))
        .args(args)
        .current_dir(dir.path())
        .env_remove("HOSTGUARD_CONFIG")
        .env("HOSTGUARD_STATE_DIR", dir.path().join("state"))
        .output()
        .unwrap()
}

#[test]
fn test_unknown_check_exits_2() {
    let dir = tempfile::tempdir().unwrap();

    let output = hostguard(&dir, &["bogus"]);

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_help_exits_0() {
    let dir = tempfile::tempdir().unwrap();

    let output = hostguard(&dir, &["help"]);

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("Usage"));
}

#[test]
fn test_inverted_threshold_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, r#"{"disk":{"warning":95,"critical":90}}"#).unwrap();

    let output = hostguard(&dir, &["--config", config.to_str().unwrap(), "disk"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("critical threshold 90%"));
}

#[test]
fn test_unparsable_config_exits_1() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.json");
    fs::write(&config, "{ not json").unwrap();

    let output = hostguard(&dir, &["--config", config.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_missing_config_is_logged_to_state_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("absent.json");

    // exits 0, or 1 on hosts without a service manager; the warning is
    // logged before detection either way
    let output = hostguard(&dir, &["--config", config.to_str().unwrap(), "dirs"]);
    assert!(matches!(output.status.code(), Some(0) | Some(1)));

    let log = fs::read_to_string(dir.path().join("state/hostguard.log")).unwrap();
    assert!(log.contains("no config file at"));
}
