//! # Log Config Manager
//!
//! Keeps a hierarchical category logger wired to shared appenders while the
//! host pushes writer and rule configurations at runtime.
//!
//! ## Features
//!
//! - **Writer Registry**: file destinations with rotation, one owner per path
//! - **Config Registry**: rules binding categories to a level and a template
//! - **Shared Appenders**: one physical appender per destination and template
//! - **Coalescing Reloads**: bursts of changes collapse into serialized passes
//! - **Legacy Patterns**: old `{0,date,...}` templates translated on the fly

pub mod appenders;
pub mod core;
pub mod manager;
pub mod registry;
pub mod reload;

pub mod prelude {
    pub use crate::appenders::{ConsoleAppender, FileAppender, StandardAppenderFactory};
    pub use crate::core::{
        Appender, AppenderFactory, ConfigError, LogEngine, LogLevel, LogRecord, LoggerContext,
        ReloadMetrics, Result, WriterSpec,
    };
    pub use crate::manager::{LogConfigManager, StatusSnapshot};
    pub use crate::registry::{CategorySpec, ConfigPayload, ManagerSettings, DEFAULT_CONFIG_ID};
    pub use crate::reload::{ReloadMode, DEFAULT_SHUTDOWN_TIMEOUT};
}

pub use appenders::{ConsoleAppender, FileAppender, StandardAppenderFactory};
pub use core::{
    Appender, AppenderFactory, AppenderHandle, AppenderKey, ConfigError, Destination, LogEngine,
    LogLevel, LogRecord, LoggerContext, ReloadMetrics, Result, RotationThreshold, StatusEntry,
    StatusLevel, StatusLog, WriterSpec,
};
pub use manager::{LogConfigManager, LogConfigManagerBuilder, StatusSnapshot};
pub use registry::{
    translate_pattern, CategorySpec, ConfigPayload, LogConfig, ManagerSettings, PropertyValue,
    Writer, DEFAULT_CONFIG_ID, DEFAULT_PATTERN,
};
pub use reload::{ReloadMode, SchedulerState, DEFAULT_SHUTDOWN_TIMEOUT};
