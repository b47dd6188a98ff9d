//! Coalescing tests for the reload scheduler
//!
//! A pass is held open while change signals arrive, then released.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log_config_manager::reload::{ReloadMode, ReloadScheduler, SchedulerState};
use log_config_manager::ReloadMetrics;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

struct GatedPass {
    version: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<usize>>>,
    entered: Receiver<()>,
    release: Sender<()>,
}

fn gated(mode: ReloadMode) -> (Arc<ReloadScheduler>, GatedPass) {
    let version = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (entered_tx, entered_rx) = unbounded();
    let (release_tx, release_rx) = unbounded::<()>();

    let pass = {
        let version = Arc::clone(&version);
        let seen = Arc::clone(&seen);
        Arc::new(move || {
            seen.lock().push(version.load(Ordering::SeqCst));
            let _ = entered_tx.send(());
            let _ = release_rx.recv_timeout(TIMEOUT);
        })
    };
    let scheduler = ReloadScheduler::new(mode, pass, Arc::new(ReloadMetrics::new()))
        .expect("Failed to create scheduler");

    (
        Arc::new(scheduler),
        GatedPass {
            version,
            seen,
            entered: entered_rx,
            release: release_tx,
        },
    )
}

fn signal_three_changes(scheduler: &ReloadScheduler, gate: &GatedPass) {
    for version in 1..=3 {
        gate.version.store(version, Ordering::SeqCst);
        scheduler.signal_changed().expect("Failed to signal");
    }
    assert_eq!(scheduler.state(), SchedulerState::RunningWithPending);
}

#[test]
fn test_background_signals_during_pass_coalesce() {
    let (scheduler, gate) = gated(ReloadMode::Background);

    scheduler.signal_changed().expect("Failed to signal");
    gate.entered.recv_timeout(TIMEOUT).expect("first pass did not start");

    signal_three_changes(&scheduler, &gate);
    gate.release.send(()).unwrap();
    gate.entered.recv_timeout(TIMEOUT).expect("follow-up pass did not start");
    gate.release.send(()).unwrap();

    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(gate.seen.lock().as_slice(), &[0, 3]);

    let metrics = scheduler.metrics();
    assert_eq!(metrics.passes_completed(), 2);
    assert_eq!(metrics.signals_received(), 4);
    assert_eq!(metrics.signals_coalesced(), 3);
}

#[test]
fn test_synchronous_signals_during_pass_coalesce() {
    let (scheduler, gate) = gated(ReloadMode::Synchronous);

    let runner = {
        let scheduler = Arc::clone(&scheduler);
        thread::spawn(move || scheduler.signal_changed())
    };
    gate.entered.recv_timeout(TIMEOUT).expect("first pass did not start");

    signal_three_changes(&scheduler, &gate);
    gate.release.send(()).unwrap();
    gate.entered.recv_timeout(TIMEOUT).expect("follow-up pass did not start");
    gate.release.send(()).unwrap();

    runner.join().unwrap().expect("signalling thread failed");
    assert_eq!(scheduler.state(), SchedulerState::Idle);
    assert_eq!(gate.seen.lock().as_slice(), &[0, 3]);
    assert_eq!(scheduler.metrics().passes_completed(), 2);
}

#[test]
fn test_concurrent_signals_never_lose_the_last_change() {
    let version = Arc::new(AtomicUsize::new(0));
    let last_seen = Arc::new(AtomicUsize::new(0));
    let pass = {
        let version = Arc::clone(&version);
        let last_seen = Arc::clone(&last_seen);
        Arc::new(move || {
            last_seen.store(version.load(Ordering::SeqCst), Ordering::SeqCst);
            thread::sleep(Duration::from_micros(200));
        })
    };
    let scheduler = Arc::new(
        ReloadScheduler::new(ReloadMode::Background, pass, Arc::new(ReloadMetrics::new()))
            .expect("Failed to create scheduler"),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let scheduler = Arc::clone(&scheduler);
            let version = Arc::clone(&version);
            thread::spawn(move || {
                for _ in 0..50 {
                    version.fetch_add(1, Ordering::SeqCst);
                    scheduler.signal_changed().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert!(scheduler.wait_idle(TIMEOUT));
    assert_eq!(last_seen.load(Ordering::SeqCst), 400);

    let metrics = scheduler.metrics();
    assert_eq!(metrics.signals_received(), 400);
    assert_eq!(metrics.passes_started(), metrics.passes_completed());
    assert!(metrics.passes_completed() <= 400);
}

#[test]
fn test_shutdown_drains_pending_pass() {
    let (scheduler, gate) = gated(ReloadMode::Background);

    scheduler.signal_changed().expect("Failed to signal");
    gate.entered.recv_timeout(TIMEOUT).expect("first pass did not start");
    gate.version.store(7, Ordering::SeqCst);
    scheduler.signal_changed().expect("Failed to signal");

    gate.release.send(()).unwrap();
    gate.release.send(()).unwrap();
    assert!(scheduler.shutdown(TIMEOUT));

    assert_eq!(gate.seen.lock().as_slice(), &[0, 7]);
    assert!(scheduler.is_stopped());
}
