//! Reload scheduler: serialized, coalescing reload passes
//!
//! States: `Idle`, `Running`, `RunningWithPending`. A change signal in
//! `Idle` starts a pass; signals arriving while a pass runs only mark one
//! follow-up pass as pending. Passes never overlap.

use crate::core::error::{ConfigError, Result};
use crate::core::metrics::ReloadMetrics;
use crossbeam_channel::{bounded, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Default shutdown timeout used when the scheduler is dropped
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// One full reload pass
pub type ReloadPass = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMode {
    /// Passes run on the thread that raised the signal
    Synchronous,
    /// Passes run on a dedicated worker thread
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    RunningWithPending,
}

struct Control {
    state: SchedulerState,
    stopped: bool,
}

struct Shared {
    control: Mutex<Control>,
    idle: Condvar,
    pass: ReloadPass,
    metrics: Arc<ReloadMetrics>,
}

impl Shared {
    /// Run passes until no change arrived during the last one
    fn run_passes(&self) {
        loop {
            self.metrics.record_pass_started();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (self.pass)()));
            if result.is_err() {
                tracing::error!("reload pass panicked");
            }
            self.metrics.record_pass_completed();

            let mut control = self.control.lock();
            match control.state {
                SchedulerState::RunningWithPending => {
                    control.state = SchedulerState::Running;
                }
                SchedulerState::Running | SchedulerState::Idle => {
                    control.state = SchedulerState::Idle;
                    self.idle.notify_all();
                    return;
                }
            }
        }
    }
}

/// Serializes reload passes and folds bursts of change signals together.
///
/// # Example
///
/// ```
/// use log_config_manager::reload::{ReloadMode, ReloadScheduler};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let passes = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&passes);
/// let scheduler = ReloadScheduler::new(
///     ReloadMode::Background,
///     Arc::new(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     }),
///     Default::default(),
/// )
/// .unwrap();
///
/// scheduler.signal_changed().unwrap();
/// assert!(scheduler.wait_idle(Duration::from_secs(5)));
/// assert!(passes.load(Ordering::SeqCst) >= 1);
/// ```
pub struct ReloadScheduler {
    shared: Arc<Shared>,
    mode: ReloadMode,
    sender: Mutex<Option<Sender<()>>>,
    worker: Mutex<Option<thread::JoinHandle<()>>>,
}

impl ReloadScheduler {
    /// # Errors
    ///
    /// Returns an IO error when the background worker cannot be spawned
    pub fn new(mode: ReloadMode, pass: ReloadPass, metrics: Arc<ReloadMetrics>) -> Result<Self> {
        let shared = Arc::new(Shared {
            control: Mutex::new(Control {
                state: SchedulerState::Idle,
                stopped: false,
            }),
            idle: Condvar::new(),
            pass,
            metrics,
        });

        let (sender, worker) = match mode {
            ReloadMode::Synchronous => (None, None),
            ReloadMode::Background => {
                // at most one wake-up is in flight: only Idle -> Running sends
                let (sender, receiver) = bounded::<()>(1);
                let worker_shared = Arc::clone(&shared);
                let handle = thread::Builder::new()
                    .name("log-config-reload".to_string())
                    .spawn(move || {
                        while receiver.recv().is_ok() {
                            worker_shared.run_passes();
                        }
                    })
                    .map_err(|e| ConfigError::io("spawning reload worker", e))?;
                (Some(sender), Some(handle))
            }
        };

        Ok(Self {
            shared,
            mode,
            sender: Mutex::new(sender),
            worker: Mutex::new(worker),
        })
    }

    pub fn mode(&self) -> ReloadMode {
        self.mode
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.control.lock().state
    }

    pub fn metrics(&self) -> &ReloadMetrics {
        &self.shared.metrics
    }

    /// Record that the configuration changed.
    ///
    /// Starts a pass when idle, otherwise marks a follow-up pass pending.
    /// In synchronous mode the starting caller runs the passes itself.
    pub fn signal_changed(&self) -> Result<()> {
        let start = {
            let mut control = self.shared.control.lock();
            if control.stopped {
                return Err(ConfigError::SchedulerStopped);
            }
            self.shared.metrics.record_signal();
            match control.state {
                SchedulerState::Idle => {
                    control.state = SchedulerState::Running;
                    true
                }
                SchedulerState::Running => {
                    control.state = SchedulerState::RunningWithPending;
                    self.shared.metrics.record_coalesced();
                    false
                }
                SchedulerState::RunningWithPending => {
                    self.shared.metrics.record_coalesced();
                    false
                }
            }
        };
        if !start {
            return Ok(());
        }

        match self.mode {
            ReloadMode::Synchronous => {
                self.shared.run_passes();
                Ok(())
            }
            ReloadMode::Background => {
                let sent = self
                    .sender
                    .lock()
                    .as_ref()
                    .is_some_and(|sender| sender.send(()).is_ok());
                if sent {
                    Ok(())
                } else {
                    let mut control = self.shared.control.lock();
                    control.state = SchedulerState::Idle;
                    self.shared.idle.notify_all();
                    Err(ConfigError::SchedulerStopped)
                }
            }
        }
    }

    /// Block until no pass is running or pending; returns whether the
    /// scheduler became idle within `timeout`
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut control = self.shared.control.lock();
        while control.state != SchedulerState::Idle {
            if self.shared.idle.wait_until(&mut control, deadline).timed_out() {
                return control.state == SchedulerState::Idle;
            }
        }
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.control.lock().stopped
    }

    /// Refuse further signals and let pending passes finish.
    ///
    /// Returns `true` if everything completed within `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.shared.control.lock().stopped = true;
        drop(self.sender.lock().take());

        let Some(handle) = self.worker.lock().take() else {
            return self.wait_idle(timeout);
        };

        let start = Instant::now();
        loop {
            if handle.is_finished() {
                if handle.join().is_err() {
                    tracing::error!("reload worker panicked during shutdown");
                    return false;
                }
                return true;
            }
            if start.elapsed() >= timeout {
                tracing::warn!(?timeout, "reload worker did not finish within timeout");
                return false;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }
}

impl Drop for ReloadScheduler {
    fn drop(&mut self) {
        if !self.is_stopped() || self.worker.lock().is_some() {
            self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(mode: ReloadMode) -> (ReloadScheduler, Arc<AtomicUsize>) {
        let passes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&passes);
        let scheduler = ReloadScheduler::new(
            mode,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            Arc::new(ReloadMetrics::new()),
        )
        .unwrap();
        (scheduler, passes)
    }

    #[test]
    fn test_synchronous_signal_runs_pass_inline() {
        let (scheduler, passes) = counting(ReloadMode::Synchronous);
        scheduler.signal_changed().unwrap();
        scheduler.signal_changed().unwrap();

        assert_eq!(passes.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(scheduler.metrics().passes_completed(), 2);
    }

    #[test]
    fn test_signal_after_shutdown_is_rejected() {
        let (scheduler, passes) = counting(ReloadMode::Background);
        scheduler.signal_changed().unwrap();
        assert!(scheduler.shutdown(Duration::from_secs(5)));

        assert!(matches!(
            scheduler.signal_changed().unwrap_err(),
            ConfigError::SchedulerStopped
        ));
        assert_eq!(passes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_pass_returns_to_idle() {
        let scheduler = ReloadScheduler::new(
            ReloadMode::Synchronous,
            Arc::new(|| panic!("broken pass")),
            Arc::new(ReloadMetrics::new()),
        )
        .unwrap();

        scheduler.signal_changed().unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(scheduler.wait_idle(Duration::from_millis(10)));
    }
}
