//! Reload metrics for observability
//!
//! Counters describing how often configuration changes were signalled,
//! how many were folded into an already running pass, and what the passes
//! did to the shared appenders.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for reload observability
///
/// # Example
///
/// ```
/// use log_config_manager::ReloadMetrics;
///
/// let metrics = ReloadMetrics::new();
///
/// metrics.record_signal();
/// metrics.record_pass_started();
/// metrics.record_pass_completed();
///
/// assert_eq!(metrics.signals_received(), 1);
/// assert_eq!(metrics.passes_completed(), 1);
/// ```
#[derive(Debug)]
pub struct ReloadMetrics {
    /// Number of change signals received
    signals_received: AtomicU64,

    /// Signals that arrived while a pass was running
    signals_coalesced: AtomicU64,

    passes_started: AtomicU64,

    passes_completed: AtomicU64,

    /// Shared appenders instantiated
    appenders_created: AtomicU64,

    /// Shared appenders whose delegate was re-created in place
    appenders_reconfigured: AtomicU64,

    appenders_closed: AtomicU64,
}

impl ReloadMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            signals_received: AtomicU64::new(0),
            signals_coalesced: AtomicU64::new(0),
            passes_started: AtomicU64::new(0),
            passes_completed: AtomicU64::new(0),
            appenders_created: AtomicU64::new(0),
            appenders_reconfigured: AtomicU64::new(0),
            appenders_closed: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn signals_received(&self) -> u64 {
        self.signals_received.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn signals_coalesced(&self) -> u64 {
        self.signals_coalesced.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn passes_started(&self) -> u64 {
        self.passes_started.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn passes_completed(&self) -> u64 {
        self.passes_completed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn appenders_created(&self) -> u64 {
        self.appenders_created.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn appenders_reconfigured(&self) -> u64 {
        self.appenders_reconfigured.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn appenders_closed(&self) -> u64 {
        self.appenders_closed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_signal(&self) -> u64 {
        self.signals_received.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_coalesced(&self) -> u64 {
        self.signals_coalesced.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_pass_started(&self) -> u64 {
        self.passes_started.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_pass_completed(&self) -> u64 {
        self.passes_completed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_appender_created(&self) -> u64 {
        self.appenders_created.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_appender_reconfigured(&self) -> u64 {
        self.appenders_reconfigured.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_appender_closed(&self) -> u64 {
        self.appenders_closed.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of signals absorbed by a running pass, as a percentage
    ///
    /// Returns 0.0 if no signal has been received.
    pub fn coalesce_rate(&self) -> f64 {
        let received = self.signals_received() as f64;
        if received == 0.0 {
            0.0
        } else {
            (self.signals_coalesced() as f64 / received) * 100.0
        }
    }
}

impl Default for ReloadMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ReloadMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            signals_received: AtomicU64::new(self.signals_received()),
            signals_coalesced: AtomicU64::new(self.signals_coalesced()),
            passes_started: AtomicU64::new(self.passes_started()),
            passes_completed: AtomicU64::new(self.passes_completed()),
            appenders_created: AtomicU64::new(self.appenders_created()),
            appenders_reconfigured: AtomicU64::new(self.appenders_reconfigured()),
            appenders_closed: AtomicU64::new(self.appenders_closed()),
        }
    }
}
