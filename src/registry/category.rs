//! Category names and their decomposition

use std::collections::BTreeSet;

/// Name of the root category
pub const ROOT_CATEGORY: &str = "";

/// Parent of a dotted category name.
///
/// Top-level names have the root as parent; the root has none.
///
/// # Example
///
/// ```
/// use log_config_manager::registry::category::parent_category;
///
/// assert_eq!(parent_category("a.b.c"), Some("a.b"));
/// assert_eq!(parent_category("a"), Some(""));
/// assert_eq!(parent_category(""), None);
/// ```
pub fn parent_category(name: &str) -> Option<&str> {
    if name.is_empty() {
        return None;
    }
    match name.rfind('.') {
        Some(index) => Some(&name[..index]),
        None => Some(ROOT_CATEGORY),
    }
}

/// Category input of a logging rule before flattening
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategorySpec {
    /// The root category only, never split
    Root,
    /// A single string, possibly comma separated
    One(String),
    /// Several strings, each possibly comma separated
    Many(Vec<String>),
}

impl CategorySpec {
    /// Flatten into the set of trimmed, non-empty category names
    pub fn decompose(&self) -> BTreeSet<String> {
        match self {
            CategorySpec::Root => BTreeSet::from([ROOT_CATEGORY.to_string()]),
            CategorySpec::One(value) => split_names(std::iter::once(value.as_str())),
            CategorySpec::Many(values) => split_names(values.iter().map(String::as_str)),
        }
    }
}

impl From<&str> for CategorySpec {
    fn from(value: &str) -> Self {
        CategorySpec::One(value.to_string())
    }
}

impl From<Vec<String>> for CategorySpec {
    fn from(values: Vec<String>) -> Self {
        CategorySpec::Many(values)
    }
}

impl From<&[&str]> for CategorySpec {
    fn from(values: &[&str]) -> Self {
        CategorySpec::Many(values.iter().map(|v| v.to_string()).collect())
    }
}

fn split_names<'a>(values: impl Iterator<Item = &'a str>) -> BTreeSet<String> {
    values
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}
