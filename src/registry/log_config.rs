//! Logging rules

use crate::core::log_level::LogLevel;
use serde::Serialize;
use std::collections::BTreeSet;

/// A rule binding categories to a level, a template and a destination
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogConfig {
    pub id: String,
    /// Native template, already translated
    pub pattern: String,
    pub level: LogLevel,
    pub categories: BTreeSet<String>,
    /// Writer owner id or destination name, `None` for the default writer
    pub destination: Option<String>,
}

impl LogConfig {
    pub fn owns(&self, category: &str) -> bool {
        self.categories.contains(category)
    }
}
