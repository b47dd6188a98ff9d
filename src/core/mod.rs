//! Core types and traits

pub mod appender;
pub mod destination;
pub mod engine;
pub mod error;
pub mod log_level;
pub mod log_record;
pub mod metrics;
pub mod status;

pub use appender::{Appender, AppenderFactory, AppenderHandle, AppenderKey, AppenderOrigin, AppenderProxy};
pub use destination::{Destination, RotationThreshold, WriterSpec};
pub use engine::{LogEngine, LoggerContext};
pub use error::{ConfigError, Result};
pub use log_level::LogLevel;
pub use log_record::LogRecord;
pub use metrics::ReloadMetrics;
pub use status::{StatusEntry, StatusLevel, StatusLog};
