//! Interface throughput and error deltas over the sampling window

use hostguard::checks::CheckKind;
use hostguard::monitors::snapshot::NetworkCounters;
use hostguard::scheduler::CheckStatus;
use pretty_assertions::assert_eq;

use crate::helpers::*;

fn counters(rx_bytes: u64, tx_bytes: u64, rx_errors: u64) -> NetworkCounters {
    NetworkCounters {
        rx_bytes,
        tx_bytes,
        rx_errors,
        tx_errors: 0,
    }
}

#[tokio::test]
async fn test_throughput_at_threshold_triggers() {
    let harness = Harness::new(|config| config.network.threshold_kib = 1);
    harness.provider.push_network(vec![
        ("eth0", counters(1000, 0, 0)),
        ("lo", counters(0, 0, 0)),
    ]);
    harness.provider.push_network(vec![
        ("eth0", counters(2024, 0, 0)),
        ("lo", counters(1 << 30, 1 << 30, 0)),
    ]);

    harness.run(CheckKind::Network).await;

    let alert = harness.notifier.last().unwrap();
    assert_eq!(alert.subject, "[test-host] WARNING: network anomaly on eth0");
    assert!(alert.body.starts_with("eth0: rx 1 KiB/s"));
    assert!(!alert.body.contains("lo:"));
}

#[tokio::test]
async fn test_new_errors_trigger_without_traffic() {
    let harness = Harness::new(|_| {});
    harness.provider.push_network(vec![
        ("eth0", counters(0, 0, 0)),
        ("eth1", counters(0, 0, 3)),
    ]);
    harness.provider.push_network(vec![
        ("eth0", counters(10, 10, 0)),
        ("eth1", counters(0, 0, 5)),
    ]);

    harness.run(CheckKind::Network).await;

    let alert = harness.notifier.last().unwrap();
    assert_eq!(alert.subject, "[test-host] WARNING: network anomaly on eth1");
    assert!(alert.body.contains("rx errors +2"));
}

#[tokio::test]
async fn test_quiet_interfaces_send_nothing() {
    let harness = Harness::new(|_| {});
    harness.provider.push_network(vec![("eth0", counters(0, 0, 0))]);
    harness.provider.push_network(vec![("eth0", counters(4096, 4096, 0))]);

    harness.run(CheckKind::Network).await;

    assert_eq!(harness.notifier.count(), 0);
}

#[tokio::test]
async fn test_provider_failure_fails_the_check() {
    let harness = Harness::new(|_| {});

    let summary = harness.run(CheckKind::Network).await;

    assert!(matches!(
        summary.status(CheckKind::Network),
        Some(CheckStatus::Failed(reason)) if reason.contains("no network sample")
    ));
}
