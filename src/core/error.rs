//! Error types for the configuration manager

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Two configurations claim the same destination file
    #[error("Log file '{path}' already configured by configuration '{owner}'")]
    DestinationConflict { path: String, owner: String },

    /// A logging rule without any category
    #[error("Missing categories in configuration '{config_id}'")]
    MissingCategories { config_id: String },

    /// A category already claimed by another rule
    #[error("Category '{category}' already defined by configuration '{owner}'")]
    CategoryConflict { category: String, owner: String },

    /// Unrecognized severity token
    #[error("Unsupported log level: '{value}'")]
    InvalidLevel { value: String },

    /// Payload value with the wrong shape
    #[error("Invalid value for property '{key}': {message}")]
    InvalidProperty { key: String, message: String },

    /// Physical appender could not be instantiated
    #[error("Cannot create appender for {destination}: {message}")]
    AppenderCreation {
        destination: String,
        message: String,
    },

    /// IO error with context
    #[error("IO error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON payload decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reload requested after the scheduler was shut down
    #[error("Reload scheduler already stopped")]
    SchedulerStopped,
}

impl ConfigError {
    /// Create a destination conflict error
    pub fn destination_conflict(path: impl Into<String>, owner: impl Into<String>) -> Self {
        ConfigError::DestinationConflict {
            path: path.into(),
            owner: owner.into(),
        }
    }

    /// Create a missing categories error
    pub fn missing_categories(config_id: impl Into<String>) -> Self {
        ConfigError::MissingCategories {
            config_id: config_id.into(),
        }
    }

    /// Create a category conflict error
    pub fn category_conflict(category: impl Into<String>, owner: impl Into<String>) -> Self {
        ConfigError::CategoryConflict {
            category: category.into(),
            owner: owner.into(),
        }
    }

    pub fn invalid_level(value: impl Into<String>) -> Self {
        ConfigError::InvalidLevel {
            value: value.into(),
        }
    }

    pub fn invalid_property(key: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::InvalidProperty {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an appender creation error
    pub fn appender(destination: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::AppenderCreation {
            destination: destination.into(),
            message: message.into(),
        }
    }

    /// Create an IO error with context
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        ConfigError::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Whether this error rejected a configuration update
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ConfigError::DestinationConflict { .. }
                | ConfigError::MissingCategories { .. }
                | ConfigError::CategoryConflict { .. }
                | ConfigError::InvalidLevel { .. }
                | ConfigError::InvalidProperty { .. }
        )
    }
}
