//! Internal status log
//!
//! The manager cannot report its own problems through the loggers it is
//! wiring, so diagnostics go to a bounded in-memory ring (queryable by
//! external tooling) and to `tracing`.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLevel::Info => write!(f, "INFO"),
            StatusLevel::Warn => write!(f, "WARN"),
            StatusLevel::Error => write!(f, "ERROR"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusEntry {
    pub level: StatusLevel,
    /// Configuration id the entry is recorded against
    pub origin: Option<String>,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub struct StatusLog {
    entries: Mutex<VecDeque<StatusEntry>>,
    capacity: usize,
    debug: bool,
}

impl StatusLog {
    /// Info entries are only retained when `debug` is set
    pub fn new(capacity: usize, debug: bool) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            debug,
        }
    }

    pub fn info(&self, origin: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(origin = origin.unwrap_or("-"), "{}", message);
        if self.debug {
            self.push(StatusLevel::Info, origin, message);
        }
    }

    pub fn warn(&self, origin: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(origin = origin.unwrap_or("-"), "{}", message);
        self.push(StatusLevel::Warn, origin, message);
    }

    pub fn error(&self, origin: Option<&str>, message: impl Into<String>) {
        let message = message.into();
        tracing::error!(origin = origin.unwrap_or("-"), "{}", message);
        self.push(StatusLevel::Error, origin, message);
    }

    fn push(&self, level: StatusLevel, origin: Option<&str>, message: String) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(StatusEntry {
            level,
            origin: origin.map(String::from),
            message,
            timestamp: Utc::now(),
        });
    }

    pub fn entries(&self) -> Vec<StatusEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Warnings and errors recorded against one configuration id
    pub fn warnings_for(&self, origin: &str) -> Vec<StatusEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level >= StatusLevel::Warn && e.origin.as_deref() == Some(origin))
            .cloned()
            .collect()
    }

    pub fn warning_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.level >= StatusLevel::Warn)
            .count()
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_only_kept_in_debug() {
        let quiet = StatusLog::new(8, false);
        quiet.info(None, "pass done");
        assert!(quiet.entries().is_empty());

        let debug = StatusLog::new(8, true);
        debug.info(None, "pass done");
        assert_eq!(debug.entries().len(), 1);
    }

    #[test]
    fn test_ring_drops_oldest() {
        let log = StatusLog::new(2, false);
        log.warn(Some("a"), "first");
        log.warn(Some("b"), "second");
        log.error(Some("a"), "third");

        let messages: Vec<_> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["second", "third"]);
    }

    #[test]
    fn test_warnings_for_origin() {
        let log = StatusLog::new(8, true);
        log.warn(Some("a"), "cannot open");
        log.info(Some("a"), "attached");
        log.warn(Some("b"), "other");

        let warnings = log.warnings_for("a");
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].message, "cannot open");
        assert_eq!(log.warning_count(), 2);
    }
}
