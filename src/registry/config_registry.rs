//! Config registry: logging rules indexed by id and by category

use super::category::{parent_category, CategorySpec};
use super::log_config::LogConfig;
use super::pattern::{is_legacy_pattern, translate_pattern};
use super::settings::ManagerSettings;
use super::writer_registry::{WriterRegistry, WriterSnapshot};
use super::DEFAULT_CONFIG_ID;
use crate::core::error::{ConfigError, Result};
use crate::core::log_level::LogLevel;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Consistent copy of the rule indices
#[derive(Debug, Clone, Default)]
pub struct ConfigSnapshot {
    by_id: HashMap<String, Arc<LogConfig>>,
    by_category: HashMap<String, Arc<LogConfig>>,
}

impl ConfigSnapshot {
    pub fn get(&self, id: &str) -> Option<&Arc<LogConfig>> {
        self.by_id.get(id)
    }

    /// Rule that claims exactly `category`
    pub fn owner_of(&self, category: &str) -> Option<&Arc<LogConfig>> {
        self.by_category.get(category)
    }

    /// Effective rule for a category: the longest claimed prefix, or the
    /// default rule when no prefix (not even the root) is claimed
    pub fn resolve(&self, category: &str) -> Option<&Arc<LogConfig>> {
        let mut name = Some(category);
        while let Some(current) = name {
            if let Some(config) = self.by_category.get(current) {
                return Some(config);
            }
            name = parent_category(current);
        }
        self.by_id.get(DEFAULT_CONFIG_ID)
    }

    pub fn configs(&self) -> impl Iterator<Item = &Arc<LogConfig>> {
        self.by_id.values()
    }

    pub fn categories(&self) -> impl Iterator<Item = &String> {
        self.by_category.keys()
    }

    /// Destination references of every rule
    pub fn references(&self) -> Vec<Option<String>> {
        self.by_id.values().map(|c| c.destination.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Registry of logging rules.
///
/// Every category is claimed by at most one rule. Updates are validated
/// completely before anything changes.
pub struct ConfigRegistry {
    tables: RwLock<ConfigSnapshot>,
    writers: Arc<WriterRegistry>,
    default_pattern: String,
}

impl ConfigRegistry {
    pub fn new(writers: Arc<WriterRegistry>, settings: &ManagerSettings) -> Self {
        Self {
            tables: RwLock::new(ConfigSnapshot::default()),
            writers,
            default_pattern: settings.default_pattern.clone(),
        }
    }

    pub fn writers(&self) -> &Arc<WriterRegistry> {
        &self.writers
    }

    /// Create or replace the rule `id`.
    ///
    /// An empty pattern falls back to the default template; legacy
    /// patterns are translated. The destination reference is resolved
    /// (creating an implicit writer if needed) and implicit writers no
    /// longer referenced afterwards are retired.
    pub fn upsert(
        &self,
        id: &str,
        pattern: Option<&str>,
        level: &str,
        categories: &CategorySpec,
        destination: Option<&str>,
    ) -> Result<Arc<LogConfig>> {
        let names = categories.decompose();
        if names.is_empty() {
            return Err(ConfigError::missing_categories(id));
        }
        let level: LogLevel = level.parse()?;

        let mut tables = self.tables.write();
        for category in &names {
            if let Some(owner) = tables.by_category.get(category) {
                if owner.id != id {
                    return Err(ConfigError::category_conflict(category.clone(), owner.id.clone()));
                }
            }
        }

        let pattern = match pattern {
            Some(pattern) if !pattern.trim().is_empty() => {
                if is_legacy_pattern(pattern) {
                    tracing::debug!(config = id, pattern, "translating legacy pattern");
                }
                translate_pattern(pattern)
            }
            _ => translate_pattern(&self.default_pattern),
        };
        let destination = destination
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(String::from);
        self.writers.resolve_or_create(destination.as_deref());

        let config = Arc::new(LogConfig {
            id: id.to_string(),
            pattern,
            level,
            categories: names,
            destination,
        });

        if let Some(previous) = tables.by_id.insert(id.to_string(), Arc::clone(&config)) {
            Self::unlink_categories(&mut tables, &previous);
        }
        for category in &config.categories {
            tables.by_category.insert(category.clone(), Arc::clone(&config));
        }

        self.sweep_writers(&tables);
        Ok(config)
    }

    /// Remove the rule `id`; returns whether it existed
    pub fn remove(&self, id: &str) -> bool {
        let mut tables = self.tables.write();
        let Some(previous) = tables.by_id.remove(id) else {
            return false;
        };
        Self::unlink_categories(&mut tables, &previous);
        self.sweep_writers(&tables);
        true
    }

    fn unlink_categories(tables: &mut ConfigSnapshot, previous: &LogConfig) {
        for category in &previous.categories {
            if tables
                .by_category
                .get(category)
                .is_some_and(|owner| owner.id == previous.id)
            {
                tables.by_category.remove(category);
            }
        }
    }

    fn sweep_writers(&self, tables: &ConfigSnapshot) {
        for retired in self.writers.sweep(&tables.references()) {
            tracing::debug!(writer = retired.id, path = ?retired.path, "retired implicit writer");
        }
    }

    /// Run `f` with the destination references of all rules while holding
    /// the registry lock, so writer changes see a stable set of rules
    pub fn with_references<R>(&self, f: impl FnOnce(&[Option<String>]) -> R) -> R {
        let tables = self.tables.read();
        f(&tables.references())
    }

    pub fn resolve(&self, category: &str) -> Option<Arc<LogConfig>> {
        self.tables.read().resolve(category).cloned()
    }

    pub fn get(&self, id: &str) -> Option<Arc<LogConfig>> {
        self.tables.read().get(id).cloned()
    }

    pub fn snapshot(&self) -> ConfigSnapshot {
        self.tables.read().clone()
    }

    /// Rules and writers captured together
    pub fn snapshot_with_writers(&self) -> (ConfigSnapshot, WriterSnapshot) {
        let tables = self.tables.read();
        (tables.clone(), self.writers.snapshot())
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}
