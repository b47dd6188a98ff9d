//! Key-value configuration payloads delivered by the host

use super::category::CategorySpec;
use crate::core::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LOG_LEVEL: &str = "level";
pub const LOG_FILE: &str = "file";
pub const LOG_FILE_NUMBER: &str = "file.number";
pub const LOG_FILE_SIZE: &str = "file.size";
pub const LOG_PATTERN: &str = "pattern";
pub const LOG_NAMES: &str = "names";

/// A single payload value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    List(Vec<String>),
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Integer(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(values: Vec<String>) -> Self {
        PropertyValue::List(values)
    }
}

impl From<Vec<&str>> for PropertyValue {
    fn from(values: Vec<&str>) -> Self {
        PropertyValue::List(values.into_iter().map(String::from).collect())
    }
}

/// Configuration record for one writer or one logging rule.
///
/// # Example
///
/// ```
/// use log_config_manager::ConfigPayload;
///
/// let payload = ConfigPayload::new()
///     .with("level", "DEBUG")
///     .with("names", vec!["org.example", "com.example"])
///     .with("file", "logs/example.log");
///
/// assert_eq!(payload.level().unwrap().as_deref(), Some("DEBUG"));
///
/// let parsed = ConfigPayload::from_json(r#"{"level": "WARN", "file.number": 3}"#).unwrap();
/// assert_eq!(parsed.file_number(), Some(3));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigPayload {
    properties: BTreeMap<String, PropertyValue>,
}

impl ConfigPayload {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    fn text(&self, key: &str) -> Result<Option<String>> {
        match self.properties.get(key) {
            None => Ok(None),
            Some(PropertyValue::Text(value)) => Ok(Some(value.clone())),
            Some(PropertyValue::Integer(value)) => Ok(Some(value.to_string())),
            Some(PropertyValue::List(values)) => match values.as_slice() {
                [] => Ok(None),
                [single] => Ok(Some(single.clone())),
                _ => Err(ConfigError::invalid_property(key, "expected a single value")),
            },
        }
    }

    /// Severity token, not yet validated
    pub fn level(&self) -> Result<Option<String>> {
        match self.properties.get(LOG_LEVEL) {
            Some(PropertyValue::Integer(_)) => Err(ConfigError::invalid_property(
                LOG_LEVEL,
                "numeric levels are not supported",
            )),
            _ => self.text(LOG_LEVEL),
        }
    }

    /// Destination reference; blank means standard output
    pub fn file(&self) -> Result<Option<String>> {
        Ok(self
            .text(LOG_FILE)?
            .map(|file| file.trim().to_string())
            .filter(|file| !file.is_empty()))
    }

    /// Maximum rolled file count, `None` when absent or unusable
    pub fn file_number(&self) -> Option<usize> {
        match self.properties.get(LOG_FILE_NUMBER)? {
            PropertyValue::Integer(value) => usize::try_from(*value).ok(),
            PropertyValue::Text(value) => value.trim().parse().ok(),
            PropertyValue::List(_) => None,
        }
    }

    /// Rotation threshold string
    pub fn file_size(&self) -> Option<String> {
        self.text(LOG_FILE_SIZE)
            .ok()
            .flatten()
            .map(|size| size.trim().to_string())
            .filter(|size| !size.is_empty())
    }

    pub fn pattern(&self) -> Result<Option<String>> {
        self.text(LOG_PATTERN)
    }

    /// Category names, undecomposed
    pub fn names(&self) -> Option<CategorySpec> {
        match self.properties.get(LOG_NAMES)? {
            PropertyValue::Text(value) => Some(CategorySpec::One(value.clone())),
            PropertyValue::Integer(value) => Some(CategorySpec::One(value.to_string())),
            PropertyValue::List(values) => Some(CategorySpec::Many(values.clone())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_accepts_mixed_value_shapes() {
        let payload = ConfigPayload::from_json(
            r#"{"level":"INFO","names":["a","b"],"file.number":"7","file.size":"10mb"}"#,
        )
        .unwrap();

        assert_eq!(payload.level().unwrap().as_deref(), Some("INFO"));
        assert_eq!(
            payload.names(),
            Some(CategorySpec::Many(vec!["a".to_string(), "b".to_string()]))
        );
        assert_eq!(payload.file_number(), Some(7));
        assert_eq!(payload.file_size().as_deref(), Some("10mb"));
    }

    #[test]
    fn test_unusable_file_number_is_absent() {
        assert_eq!(ConfigPayload::new().with(LOG_FILE_NUMBER, -1i64).file_number(), None);
        assert_eq!(ConfigPayload::new().with(LOG_FILE_NUMBER, "many").file_number(), None);
    }

    #[test]
    fn test_blank_file_means_console() {
        assert_eq!(ConfigPayload::new().with(LOG_FILE, "  ").file().unwrap(), None);
        assert_eq!(
            ConfigPayload::new().with(LOG_FILE, vec!["app.log"]).file().unwrap(),
            Some("app.log".to_string())
        );
    }

    #[test]
    fn test_wrong_shapes_are_rejected() {
        let err = ConfigPayload::new().with(LOG_FILE, vec!["a.log", "b.log"]).file().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProperty { ref key, .. } if key == LOG_FILE));

        let err = ConfigPayload::new().with(LOG_LEVEL, 20000i64).level().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProperty { .. }));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            ConfigPayload::from_json("{not json").unwrap_err(),
            ConfigError::Json(_)
        ));
    }
}
