//! Log record structure

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

// Thread-local cache for the thread label to avoid repeated allocations
thread_local! {
    static THREAD_LABEL_CACHE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Thread name, or its id when unnamed
fn thread_label() -> String {
    THREAD_LABEL_CACHE.with(|cache| {
        cache
            .borrow_mut()
            .get_or_insert_with(|| {
                let current = std::thread::current();
                current
                    .name()
                    .map(String::from)
                    .unwrap_or_else(|| format!("{:?}", current.id()))
            })
            .clone()
    })
}

/// One record dispatched by the log engine to the appenders of a category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub category: String,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub thread: String,
}

impl LogRecord {
    /// Replaces line breaks and tabs so one record always stays one line
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(category: impl Into<String>, level: LogLevel, message: impl AsRef<str>) -> Self {
        Self {
            category: category.into(),
            level,
            message: Self::sanitize_message(message.as_ref()),
            timestamp: Utc::now(),
            thread: thread_label(),
        }
    }

    /// Fixed single-line layout used by the bundled appenders
    pub fn to_line(&self) -> String {
        format!(
            "{} *{}* [{}] {} {}\n",
            self.timestamp.format("%d.%m.%Y %H:%M:%S%.3f"),
            self.level,
            self.thread,
            self.category,
            self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_is_single_line() {
        let record = LogRecord::new("a.b", LogLevel::Info, "first\nsecond\r\tthird");
        assert_eq!(record.message, "first\\nsecond\\r\\tthird");

        let line = record.to_line();
        assert_eq!(line.matches('\n').count(), 1);
        assert!(line.contains("*INFO*"));
        assert!(line.contains(" a.b "));
    }
}
