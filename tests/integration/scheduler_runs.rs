//! Scan gating and failure containment across checks

use assert_matches::assert_matches;
use hostguard::checks::{CheckKind, CheckOutcome};
use hostguard::monitors::thresholds::Severity;
use hostguard::provider::CpuSample;
use hostguard::scheduler::CheckStatus;
use pretty_assertions::assert_eq;

use crate::helpers::*;

#[tokio::test]
async fn test_failing_check_does_not_stop_the_rest() {
    let harness = Harness::new(|_| {});
    *harness.provider.fail_memory.lock().unwrap() = true;
    *harness.provider.cpu.lock().unwrap() = CpuSample {
        per_core: vec![95.0, 95.0],
    };

    let summary = harness
        .scheduler
        .run(&[CheckKind::Memory, CheckKind::Cpu, CheckKind::Dirs])
        .await;

    assert_eq!(summary.results.len(), 3);
    assert_matches!(
        summary.status(CheckKind::Memory),
        Some(CheckStatus::Failed(reason)) if reason.contains("meminfo unavailable")
    );
    assert_matches!(
        summary.status(CheckKind::Cpu),
        Some(CheckStatus::Completed(CheckOutcome { worst: Some(Severity::Critical), alerts_sent: 1, .. }))
    );
    assert_eq!(
        summary.status(CheckKind::Dirs),
        Some(&CheckStatus::Completed(CheckOutcome::healthy()))
    );
    assert_eq!(summary.alerts_sent(), 1);
}

#[tokio::test]
async fn test_scan_interval_skips_until_due() {
    let harness = Harness::new(|config| config.intervals.memory = 60);
    harness.provider.set_memory_percent(20);

    let first = harness.run(CheckKind::Memory).await;
    assert_matches!(first.status(CheckKind::Memory), Some(CheckStatus::Completed(_)));

    harness.clock.advance(59);
    let second = harness.run(CheckKind::Memory).await;
    assert_eq!(second.status(CheckKind::Memory), Some(&CheckStatus::Skipped));

    harness.clock.advance(1);
    let third = harness.run(CheckKind::Memory).await;
    assert_matches!(third.status(CheckKind::Memory), Some(CheckStatus::Completed(_)));
}

#[tokio::test]
async fn test_scan_gates_are_independent_per_check() {
    let harness = Harness::new(|config| {
        config.intervals.memory = 3600;
        config.intervals.cpu = 3600;
    });

    harness.run(CheckKind::Memory).await;
    let summary = harness
        .scheduler
        .run(&[CheckKind::Memory, CheckKind::Cpu])
        .await;

    assert_eq!(summary.status(CheckKind::Memory), Some(&CheckStatus::Skipped));
    assert_matches!(summary.status(CheckKind::Cpu), Some(CheckStatus::Completed(_)));
}

#[tokio::test]
async fn test_scan_keys_are_persisted_under_state_dir() {
    let harness = Harness::new(|_| {});

    harness.run(CheckKind::Cpu).await;

    let record = harness.dir.path().join("state/throttle/cpu_check");
    assert_eq!(
        std::fs::read_to_string(record).unwrap().trim(),
        START.to_string()
    );
}
