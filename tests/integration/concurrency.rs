//! Overlapping invocations sharing one state directory

use std::sync::{Arc, Barrier};
use std::thread;

use hostguard::state::{Clock, Manifest, ManifestStore, ManualClock, Reconciliation, ThrottleStore};

use crate::helpers::START;

#[test]
fn test_racing_should_run_fires_once() {
    let dir = tempfile::tempdir().unwrap();
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(START));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            // a separate store per thread, like separate processes
            let store = ThrottleStore::open(dir.path(), clock.clone()).unwrap();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                store.should_run("mem_email_critical", 3600)
            })
        })
        .collect();

    let fired = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .filter(|fired| *fired)
        .count();

    assert_eq!(fired, 1);
}

#[test]
fn test_racing_reconcile_alerts_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = ManifestStore::open(dir.path()).unwrap();
    store
        .save("dirs", &Manifest::from_entries([("/etc/passwd", "aaaa")]))
        .unwrap();

    let barrier = Arc::new(Barrier::new(4));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                let fresh = Manifest::from_entries([("/etc/passwd", "bbbb")]);
                store.reconcile("dirs", fresh, |_| true).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<Reconciliation> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let alerted = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Reconciliation::Alerted(_)))
        .count();
    assert_eq!(alerted, 1);
    assert_eq!(
        outcomes.len() - alerted,
        outcomes
            .iter()
            .filter(|outcome| **outcome == Reconciliation::Unchanged)
            .count()
    );
}
