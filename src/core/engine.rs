//! Log engine seam and the bundled in-process engine

use super::{
    appender::AppenderHandle, log_level::LogLevel, log_record::LogRecord,
};
use crate::registry::category::{parent_category, ROOT_CATEGORY};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Operations the reconciler needs from the log engine.
///
/// Category names are free-form dotted strings; the empty string is the
/// root category and always exists.
pub trait LogEngine: Send + Sync {
    /// All live categories, root included
    fn categories(&self) -> Vec<String>;

    /// Make `category` live if it is not yet
    fn ensure_category(&self, category: &str);

    /// Set (or clear) the threshold of a category
    fn set_level(&self, category: &str, level: Option<LogLevel>);

    /// Appenders currently attached to a category
    fn appenders(&self, category: &str) -> Vec<AppenderHandle>;

    /// Attach an appender; attaching the same appender twice is a no-op
    fn attach(&self, category: &str, appender: AppenderHandle);

    /// Detach by appender id, returns whether it was attached
    fn detach(&self, category: &str, appender_id: u64) -> bool;
}

#[derive(Default)]
struct CategoryLogger {
    level: Option<LogLevel>,
    appenders: Vec<AppenderHandle>,
}

/// In-process log engine.
///
/// A category that was never wired inherits threshold and appenders from
/// its nearest ancestor that has a threshold, so records logged between a
/// category's creation and the next reload pass still reach a sink.
///
/// # Example
///
/// ```
/// use log_config_manager::core::{LogEngine, LogLevel, LoggerContext};
///
/// let context = LoggerContext::new();
/// context.set_level("", Some(LogLevel::Warn));
///
/// assert!(!context.is_enabled("org.example", LogLevel::Info));
/// assert!(context.is_enabled("org.example", LogLevel::Error));
/// ```
pub struct LoggerContext {
    loggers: RwLock<BTreeMap<String, CategoryLogger>>,
    dispatched: AtomicU64,
    failed: AtomicU64,
}

impl LoggerContext {
    #[must_use]
    pub fn new() -> Self {
        let mut loggers = BTreeMap::new();
        loggers.insert(ROOT_CATEGORY.to_string(), CategoryLogger::default());
        Self {
            loggers: RwLock::new(loggers),
            dispatched: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Effective threshold of a category, `Info` when nothing is wired
    pub fn effective_level(&self, category: &str) -> LogLevel {
        let loggers = self.loggers.read();
        Self::effective(&loggers, category)
            .and_then(|logger| logger.level)
            .unwrap_or_default()
    }

    pub fn is_enabled(&self, category: &str, level: LogLevel) -> bool {
        self.effective_level(category).enables(level)
    }

    fn effective<'a>(
        loggers: &'a BTreeMap<String, CategoryLogger>,
        category: &str,
    ) -> Option<&'a CategoryLogger> {
        let mut name = Some(category);
        while let Some(current) = name {
            if let Some(logger) = loggers.get(current) {
                if logger.level.is_some() {
                    return Some(logger);
                }
            }
            name = parent_category(current);
        }
        None
    }

    /// Log a message; returns whether it passed the category threshold.
    ///
    /// Each appender is isolated: a failing or panicking appender does not
    /// keep the record from the others.
    pub fn log(&self, category: &str, level: LogLevel, message: impl AsRef<str>) -> bool {
        self.ensure_category(category);

        let (threshold, appenders) = {
            let loggers = self.loggers.read();
            match Self::effective(&loggers, category) {
                Some(logger) => (logger.level.unwrap_or_default(), logger.appenders.clone()),
                None => (LogLevel::default(), Vec::new()),
            }
        };
        if !threshold.enables(level) {
            return false;
        }

        let record = LogRecord::new(category, level, message);
        for appender in &appenders {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                appender.append(&record)
            }));
            match result {
                Ok(Ok(())) => {
                    self.dispatched.fetch_add(1, Ordering::Relaxed);
                }
                Ok(Err(e)) => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(appender = appender.id(), error = %e, "appender failed");
                }
                Err(_) => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(appender = appender.id(), "appender panicked");
                }
            }
        }
        true
    }

    /// Flush every attached appender once
    pub fn flush(&self) {
        let loggers = self.loggers.read();
        let mut seen = std::collections::HashSet::new();
        for appender in loggers.values().flat_map(|logger| logger.appenders.iter()) {
            if seen.insert(appender.id()) {
                if let Err(e) = appender.flush() {
                    tracing::warn!(appender = appender.id(), error = %e, "flush failed");
                }
            }
        }
    }

    /// Number of records delivered to appenders
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Number of failed appender calls
    pub fn failed_count(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Threshold explicitly set on a category
    pub fn level(&self, category: &str) -> Option<LogLevel> {
        self.loggers.read().get(category).and_then(|logger| logger.level)
    }
}

impl Default for LoggerContext {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEngine for LoggerContext {
    fn categories(&self) -> Vec<String> {
        self.loggers.read().keys().cloned().collect()
    }

    fn ensure_category(&self, category: &str) {
        if self.loggers.read().contains_key(category) {
            return;
        }
        self.loggers
            .write()
            .entry(category.to_string())
            .or_default();
    }

    fn set_level(&self, category: &str, level: Option<LogLevel>) {
        self.loggers
            .write()
            .entry(category.to_string())
            .or_default()
            .level = level;
    }

    fn appenders(&self, category: &str) -> Vec<AppenderHandle> {
        self.loggers
            .read()
            .get(category)
            .map(|logger| logger.appenders.clone())
            .unwrap_or_default()
    }

    fn attach(&self, category: &str, appender: AppenderHandle) {
        let mut loggers = self.loggers.write();
        let logger = loggers.entry(category.to_string()).or_default();
        if !logger.appenders.iter().any(|a| a.id() == appender.id()) {
            logger.appenders.push(appender);
        }
    }

    fn detach(&self, category: &str, appender_id: u64) -> bool {
        let mut loggers = self.loggers.write();
        match loggers.get_mut(category) {
            Some(logger) => {
                let before = logger.appenders.len();
                logger.appenders.retain(|a| a.id() != appender_id);
                logger.appenders.len() != before
            }
            None => false,
        }
    }
}
