//! Two-sample counter deltas
//!
//! A snapshot is a set of monotonically increasing counters keyed by label
//! (an interface name, for network counters). Diffing two snapshots taken a
//! fixed window apart yields one delta per label present in both.

use std::collections::BTreeMap;

use serde::Serialize;

/// Counter set that knows how to turn two readings into a delta
pub trait Counters {
    type Delta;

    fn delta(&self, earlier: &Self, window_secs: u64) -> Self::Delta;
}

/// Labelled counters at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot<C> {
    counters: BTreeMap<String, C>,
}

impl<C> Snapshot<C> {
    pub fn new(counters: impl IntoIterator<Item = (String, C)>) -> Self {
        Self {
            counters: counters.into_iter().collect(),
        }
    }

    pub fn get(&self, label: &str) -> Option<&C> {
        self.counters.get(label)
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.counters.keys().map(String::as_str)
    }
}

/// Per-label deltas from `earlier` to `later`. Labels missing from either
/// snapshot are dropped.
pub fn diff<C: Counters>(
    earlier: &Snapshot<C>,
    later: &Snapshot<C>,
    window_secs: u64,
) -> BTreeMap<String, C::Delta> {
    later
        .counters
        .iter()
        .filter_map(|(label, now)| {
            earlier
                .counters
                .get(label)
                .map(|before| (label.clone(), now.delta(before, window_secs)))
        })
        .collect()
}

/// Raw interface counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkCounters {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

/// Throughput in KiB/s (truncated) and error counts over one window
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NetworkDelta {
    pub rx_kib_per_sec: u64,
    pub tx_kib_per_sec: u64,
    pub rx_errors: u64,
    pub tx_errors: u64,
}

impl NetworkDelta {
    pub fn has_errors(&self) -> bool {
        self.rx_errors > 0 || self.tx_errors > 0
    }

    pub fn exceeds(&self, threshold_kib: u64) -> bool {
        self.rx_kib_per_sec >= threshold_kib || self.tx_kib_per_sec >= threshold_kib
    }
}

impl Counters for NetworkCounters {
    type Delta = NetworkDelta;

    fn delta(&self, earlier: &Self, window_secs: u64) -> NetworkDelta {
        let window = window_secs.max(1);
        // counters reset when an interface bounces; treat that as zero traffic
        let rate = |now: u64, before: u64| now.saturating_sub(before) / window / 1024;

        NetworkDelta {
            rx_kib_per_sec: rate(self.rx_bytes, earlier.rx_bytes),
            tx_kib_per_sec: rate(self.tx_bytes, earlier.tx_bytes),
            rx_errors: self.rx_errors.saturating_sub(earlier.rx_errors),
            tx_errors: self.tx_errors.saturating_sub(earlier.tx_errors),
        }
    }
}
