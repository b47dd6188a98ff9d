//! Process-wide settings of the configuration manager

use super::pattern::DEFAULT_PATTERN;
use super::payload::{self, ConfigPayload};
use crate::core::log_level::LogLevel;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

pub const DEFAULT_FILE_NUMBER: usize = 5;
pub const DEFAULT_FILE_SIZE: &str = "'.'yyyy-MM-dd";
pub const DEFAULT_STATUS_CAPACITY: usize = 256;

/// Property keys read by [`ManagerSettings::from_properties`]
pub mod keys {
    pub const ROOT_DIR: &str = "log.root_dir";
    pub const DEBUG: &str = "log.debug";
    pub const BACKGROUND: &str = "log.background";
    pub const LEVEL: &str = "log.level";
    pub const FILE: &str = "log.file";
    pub const FILE_NUMBER: &str = "log.file.number";
    pub const FILE_SIZE: &str = "log.file.size";
    pub const PATTERN: &str = "log.pattern";
    pub const STATUS_CAPACITY: &str = "log.status.capacity";
}

/// Settings shared by every registry and the reload machinery.
///
/// # Example
///
/// ```
/// use log_config_manager::{LogLevel, ManagerSettings};
///
/// let settings = ManagerSettings::new()
///     .root_dir("/var/app")
///     .default_level(LogLevel::Warn)
///     .default_file("logs/app.log")
///     .debug(true);
///
/// assert_eq!(settings.default_file_number, 5);
/// assert!(settings.debug);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Base directory for relative destination paths
    pub root_dir: PathBuf,
    /// Retain info-level status entries
    pub debug: bool,
    /// Run reload passes on a worker thread
    pub background_reload: bool,
    pub default_level: LogLevel,
    pub default_pattern: String,
    /// Destination of the default rule, `None` for standard output
    pub default_file: Option<String>,
    pub default_file_number: usize,
    pub default_file_size: String,
    pub status_capacity: usize,
}

impl ManagerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value"]
    pub fn root_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.root_dir = dir.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn background_reload(mut self, background: bool) -> Self {
        self.background_reload = background;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn default_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn default_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.default_pattern = pattern.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn default_file(mut self, file: impl Into<String>) -> Self {
        self.default_file = Some(file.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn default_rotation(mut self, file_number: usize, file_size: impl Into<String>) -> Self {
        self.default_file_number = file_number;
        self.default_file_size = file_size.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn status_capacity(mut self, capacity: usize) -> Self {
        self.status_capacity = capacity;
        self
    }

    /// Read settings from flat host properties, keeping defaults for
    /// anything absent or unparseable
    pub fn from_properties(properties: &HashMap<String, String>) -> Self {
        let mut settings = Self::default();
        let get = |key: &str| {
            properties
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        if let Some(dir) = get(keys::ROOT_DIR) {
            settings.root_dir = PathBuf::from(dir);
        }
        if let Some(debug) = get(keys::DEBUG) {
            settings.debug = debug.eq_ignore_ascii_case("true");
        }
        if let Some(background) = get(keys::BACKGROUND) {
            settings.background_reload = background.eq_ignore_ascii_case("true");
        }
        if let Some(level) = get(keys::LEVEL).and_then(|l| l.parse().ok()) {
            settings.default_level = level;
        }
        if let Some(file) = get(keys::FILE) {
            settings.default_file = Some(file.to_string());
        }
        if let Some(number) = get(keys::FILE_NUMBER).and_then(|n| n.parse().ok()) {
            settings.default_file_number = number;
        }
        if let Some(size) = get(keys::FILE_SIZE) {
            settings.default_file_size = size.to_string();
        }
        if let Some(pattern) = get(keys::PATTERN) {
            settings.default_pattern = pattern.to_string();
        }
        if let Some(capacity) = get(keys::STATUS_CAPACITY).and_then(|c| c.parse().ok()) {
            settings.status_capacity = capacity;
        }
        settings
    }

    /// Payload applied to the default rule when the host has none
    pub fn default_payload(&self) -> ConfigPayload {
        let mut payload = ConfigPayload::new()
            .with(payload::LOG_LEVEL, self.default_level.to_str())
            .with(payload::LOG_PATTERN, self.default_pattern.as_str())
            .with(payload::LOG_FILE_NUMBER, self.default_file_number as i64)
            .with(payload::LOG_FILE_SIZE, self.default_file_size.as_str());
        if let Some(file) = &self.default_file {
            payload.insert(payload::LOG_FILE, file.as_str());
        }
        payload
    }
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            root_dir: std::env::current_dir().unwrap_or_default(),
            debug: false,
            background_reload: false,
            default_level: LogLevel::Info,
            default_pattern: DEFAULT_PATTERN.to_string(),
            default_file: None,
            default_file_number: DEFAULT_FILE_NUMBER,
            default_file_size: DEFAULT_FILE_SIZE.to_string(),
            status_capacity: DEFAULT_STATUS_CAPACITY,
        }
    }
}
