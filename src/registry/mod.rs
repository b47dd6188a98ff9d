//! Writer and rule registries

pub mod category;
pub mod config_registry;
pub mod log_config;
pub mod pattern;
pub mod payload;
pub mod settings;
pub mod writer;
pub mod writer_registry;

/// Id of the always-present default rule and its writer
pub const DEFAULT_CONFIG_ID: &str = "log.default";

pub use category::{parent_category, CategorySpec, ROOT_CATEGORY};
pub use config_registry::{ConfigRegistry, ConfigSnapshot};
pub use log_config::LogConfig;
pub use pattern::{translate_pattern, DEFAULT_PATTERN};
pub use payload::{ConfigPayload, PropertyValue};
pub use settings::ManagerSettings;
pub use writer::{Writer, WriterId, WriterOwner};
pub use writer_registry::{WriterRegistry, WriterSnapshot};
