//! Directory integrity lifecycle: baseline, unchanged, drift, held drift

use std::fs;

use assert_matches::assert_matches;
use hostguard::checks::dirs::BASELINE;
use hostguard::checks::{CheckKind, CheckOutcome};
use hostguard::monitors::thresholds::Severity;
use hostguard::scheduler::CheckStatus;
use hostguard::state::manifest::hash_file;
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_dirs_lifecycle() {
    let watched = tempfile::tempdir().unwrap();
    let config_file = watched.path().join("app.conf");
    fs::write(&config_file, "listen 80\n").unwrap();
    fs::create_dir(watched.path().join("nested")).unwrap();
    fs::write(watched.path().join("nested/key.pem"), "secret").unwrap();

    let root = watched.path().to_path_buf();
    let harness = Harness::new(move |config| config.watched_dirs = vec![root]);
    let manifests = harness.context().manifests.clone();

    // first scan stores the baseline quietly
    let summary = harness.run(CheckKind::Dirs).await;
    assert_eq!(
        summary.status(CheckKind::Dirs),
        Some(&CheckStatus::Completed(CheckOutcome::healthy()))
    );
    assert_eq!(manifests.load(BASELINE).unwrap().len(), 2);
    assert_eq!(harness.notifier.count(), 0);

    harness.clock.advance(60);
    harness.run(CheckKind::Dirs).await;
    assert_eq!(harness.notifier.count(), 0);

    fs::write(&config_file, "listen 8080\n").unwrap();
    harness.clock.advance(60);
    let summary = harness.run(CheckKind::Dirs).await;

    assert_matches!(
        summary.status(CheckKind::Dirs),
        Some(CheckStatus::Completed(CheckOutcome { worst: Some(Severity::Warning), alerts_sent: 1, .. }))
    );
    let alert = harness.notifier.last().unwrap();
    assert_eq!(
        alert.subject,
        "[test-host] WARNING: watched directories changed (2 entries)"
    );
    let lines: Vec<&str> = alert.body.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("- "));
    assert!(lines[1].starts_with("+ "));
    assert!(lines.iter().all(|line| line.ends_with("app.conf")));

    let path_key = config_file.to_string_lossy().to_string();
    let alerted_hash = hash_file(&config_file).unwrap();
    assert_eq!(
        manifests.load(BASELINE).unwrap().get(&path_key),
        Some(alerted_hash.as_str())
    );

    // drift inside the alert cool-down is held and the baseline stays put
    fs::write(&config_file, "listen 9090\n").unwrap();
    harness.clock.advance(60);
    let summary = harness.run(CheckKind::Dirs).await;

    assert_matches!(
        summary.status(CheckKind::Dirs),
        Some(CheckStatus::Completed(CheckOutcome { alerts_sent: 0, alerts_held: 1, .. }))
    );
    assert_eq!(harness.notifier.count(), 1);
    assert_eq!(
        manifests.load(BASELINE).unwrap().get(&path_key),
        Some(alerted_hash.as_str())
    );

    // once the cool-down passes the held drift is reported
    harness.clock.advance(3600);
    harness.run(CheckKind::Dirs).await;
    assert_eq!(harness.notifier.count(), 2);
    assert_eq!(
        manifests.load(BASELINE).unwrap().get(&path_key),
        Some(hash_file(&config_file).unwrap().as_str())
    );
}

#[tokio::test]
async fn test_removed_file_is_reported() {
    let watched = tempfile::tempdir().unwrap();
    let doomed = watched.path().join("doomed");
    fs::write(&doomed, "x").unwrap();
    fs::write(watched.path().join("kept"), "y").unwrap();

    let root = watched.path().to_path_buf();
    let harness = Harness::new(move |config| config.watched_dirs = vec![root]);

    harness.run(CheckKind::Dirs).await;
    fs::remove_file(&doomed).unwrap();
    harness.run(CheckKind::Dirs).await;

    let alert = harness.notifier.last().unwrap();
    assert_eq!(alert.body.lines().count(), 1);
    assert!(alert.body.starts_with("- "));
    assert!(alert.body.contains("doomed"));
}

#[tokio::test]
async fn test_no_watched_dirs_is_healthy() {
    let harness = Harness::new(|_| {});

    let summary = harness.run(CheckKind::Dirs).await;

    assert_eq!(
        summary.status(CheckKind::Dirs),
        Some(&CheckStatus::Completed(CheckOutcome::healthy()))
    );
}
