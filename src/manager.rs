//! Host-facing configuration manager

use crate::appenders::StandardAppenderFactory;
use crate::core::{
    Appender, AppenderFactory, ConfigError, LogEngine, LogLevel, LoggerContext, ReloadMetrics,
    Result, StatusEntry, StatusLog,
};
use crate::registry::{
    CategorySpec, ConfigPayload, ConfigRegistry, LogConfig, ManagerSettings, Writer,
    WriterRegistry, DEFAULT_CONFIG_ID,
};
use crate::reload::{
    AppenderReconciler, ReloadMode, ReloadPass, ReloadScheduler, DEFAULT_SHUTDOWN_TIMEOUT,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Read-only view of the manager for external tooling
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub explicit_writers: usize,
    pub implicit_writers: usize,
    pub configs: usize,
    /// Live categories of the log engine
    pub categories: usize,
    pub managed_appenders: usize,
    /// Category to appender attachments
    pub attached_appenders: usize,
    pub dynamic_appenders: Vec<String>,
    pub passes_completed: u64,
    pub writers: Vec<Writer>,
    pub rules: Vec<LogConfig>,
    pub warnings: Vec<StatusEntry>,
}

impl StatusSnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Builder for [`LogConfigManager`]
pub struct LogConfigManagerBuilder {
    settings: ManagerSettings,
    engine: Option<Arc<dyn LogEngine>>,
    factory: Option<Arc<dyn AppenderFactory>>,
}

impl LogConfigManagerBuilder {
    pub fn new() -> Self {
        Self {
            settings: ManagerSettings::default(),
            engine: None,
            factory: None,
        }
    }

    #[must_use = "builder methods return a new value"]
    pub fn settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Log engine to wire; a fresh [`LoggerContext`] when not set
    #[must_use = "builder methods return a new value"]
    pub fn engine(mut self, engine: Arc<dyn LogEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Physical appender factory; [`StandardAppenderFactory`] when not set
    #[must_use = "builder methods return a new value"]
    pub fn factory(mut self, factory: Arc<dyn AppenderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Build the manager, install the default rule and run the first pass
    pub fn build(self) -> Result<LogConfigManager> {
        let settings = self.settings;
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(LoggerContext::new()) as Arc<dyn LogEngine>);
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(StandardAppenderFactory) as Arc<dyn AppenderFactory>);

        let status = Arc::new(StatusLog::new(settings.status_capacity, settings.debug));
        let metrics = Arc::new(ReloadMetrics::new());
        let writers = Arc::new(WriterRegistry::new(&settings));
        let configs = Arc::new(ConfigRegistry::new(Arc::clone(&writers), &settings));
        let reconciler = Arc::new(AppenderReconciler::new(
            Arc::clone(&engine),
            factory,
            Arc::clone(&status),
            Arc::clone(&metrics),
        ));

        let pass: ReloadPass = {
            let configs = Arc::clone(&configs);
            let reconciler = Arc::clone(&reconciler);
            let status = Arc::clone(&status);
            Arc::new(move || {
                let (rules, writers) = configs.snapshot_with_writers();
                let summary = reconciler.reconcile(&rules, &writers);
                if !status.is_debug() {
                    return;
                }
                status.info(
                    None,
                    format!(
                        "reload pass wired {} categories through {} appenders ({} created, {} closed)",
                        summary.categories,
                        summary.managed_appenders,
                        summary.created,
                        summary.closed
                    ),
                );
            })
        };
        let mode = if settings.background_reload {
            ReloadMode::Background
        } else {
            ReloadMode::Synchronous
        };
        let scheduler = ReloadScheduler::new(mode, pass, Arc::clone(&metrics))?;

        let manager = LogConfigManager {
            settings,
            configs,
            writers,
            engine,
            reconciler,
            scheduler,
            status,
            metrics,
        };
        manager.update_global(None)?;
        Ok(manager)
    }
}

impl Default for LogConfigManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps the log engine's category wiring in line with writer and rule
/// configurations pushed by the host.
///
/// # Example
///
/// ```
/// use log_config_manager::{ConfigPayload, LogConfigManager, LogLevel, ManagerSettings};
///
/// let manager = LogConfigManager::new(ManagerSettings::new()).unwrap();
/// manager
///     .update_config(
///         "rule.db",
///         Some(&ConfigPayload::new().with("level", "DEBUG").with("names", "org.example.db")),
///     )
///     .unwrap();
///
/// assert_eq!(manager.resolve("org.example.db.pool").unwrap().level, LogLevel::Debug);
/// assert_eq!(manager.resolve("org.example").unwrap().id, "log.default");
/// ```
pub struct LogConfigManager {
    settings: ManagerSettings,
    configs: Arc<ConfigRegistry>,
    writers: Arc<WriterRegistry>,
    engine: Arc<dyn LogEngine>,
    reconciler: Arc<AppenderReconciler>,
    scheduler: ReloadScheduler,
    status: Arc<StatusLog>,
    metrics: Arc<ReloadMetrics>,
}

impl LogConfigManager {
    /// Manager over a fresh [`LoggerContext`] with the bundled appenders
    pub fn new(settings: ManagerSettings) -> Result<Self> {
        Self::builder().settings(settings).build()
    }

    #[must_use]
    pub fn builder() -> LogConfigManagerBuilder {
        LogConfigManagerBuilder::new()
    }

    pub fn settings(&self) -> &ManagerSettings {
        &self.settings
    }

    pub fn engine(&self) -> &Arc<dyn LogEngine> {
        &self.engine
    }

    /// Create, update or (with `None`) remove the writer configuration `id`.
    ///
    /// The default writer is reset to the settings' defaults instead of
    /// being removed.
    pub fn update_writer(&self, id: &str, payload: Option<&ConfigPayload>) -> Result<()> {
        self.ensure_running()?;
        let default_payload;
        let payload = match payload {
            Some(payload) => Some(payload),
            None if id == DEFAULT_CONFIG_ID => {
                default_payload = self.settings.default_payload();
                Some(&default_payload)
            }
            None => None,
        };

        match payload {
            Some(payload) => {
                let file = payload.file()?;
                let file_number = payload.file_number();
                let file_size = payload.file_size();
                self.configs.with_references(|references| {
                    let result = self.writers.upsert(
                        id,
                        file.as_deref(),
                        file_number,
                        file_size.as_deref(),
                        references,
                    );
                    self.writers.sweep(references);
                    result
                })?;
                self.status.info(Some(id), "writer configuration applied");
            }
            None => {
                let removed = self.configs.with_references(|references| {
                    let removed = self.writers.remove(id, references);
                    self.writers.sweep(references);
                    removed
                });
                if !removed {
                    return Ok(());
                }
                self.status.info(Some(id), "writer configuration removed");
            }
        }
        self.scheduler.signal_changed()
    }

    /// Create, replace or (with `None`) remove the logging rule `id`.
    ///
    /// The default rule is the global configuration: its payload applies to
    /// the default writer too, and `None` resets both to the settings'
    /// defaults instead of removing them.
    pub fn update_config(&self, id: &str, payload: Option<&ConfigPayload>) -> Result<()> {
        if id == DEFAULT_CONFIG_ID {
            return self.update_global(payload);
        }
        self.ensure_running()?;

        match payload {
            Some(payload) => {
                let file = payload.file()?;
                let pattern = payload.pattern()?;
                let level = payload.level()?.unwrap_or_default();
                let categories = payload
                    .names()
                    .ok_or_else(|| ConfigError::missing_categories(id))?;

                self.configs.upsert(
                    id,
                    pattern.as_deref(),
                    &level,
                    &categories,
                    file.as_deref(),
                )?;
                self.status.info(Some(id), "logging rule applied");
            }
            None => {
                if !self.configs.remove(id) {
                    return Ok(());
                }
                self.status.info(Some(id), "logging rule removed");
            }
        }
        self.scheduler.signal_changed()
    }

    /// Apply the global configuration to the default writer and the
    /// default rule; `None` restores the settings' defaults
    pub fn update_global(&self, payload: Option<&ConfigPayload>) -> Result<()> {
        self.ensure_running()?;
        let default_payload;
        let payload = match payload {
            Some(payload) => payload,
            None => {
                default_payload = self.settings.default_payload();
                &default_payload
            }
        };

        let level = self.global_level(payload)?;
        let file = payload.file()?;
        payload.pattern()?;

        self.configs.with_references(|references| {
            let result = self.writers.upsert(
                DEFAULT_CONFIG_ID,
                file.as_deref(),
                payload.file_number(),
                payload.file_size().as_deref(),
                references,
            );
            self.writers.sweep(references);
            result
        })?;
        self.apply_default_rule(payload, level)?;
        self.status.info(Some(DEFAULT_CONFIG_ID), "global configuration applied");
        self.scheduler.signal_changed()
    }

    fn global_level(&self, payload: &ConfigPayload) -> Result<LogLevel> {
        match payload.level()? {
            Some(level) => level.parse(),
            None => Ok(self.settings.default_level),
        }
    }

    /// Rejects mutations once reloads are stopped, leaving the registries
    /// untouched
    fn ensure_running(&self) -> Result<()> {
        if self.scheduler.is_stopped() {
            return Err(ConfigError::SchedulerStopped);
        }
        Ok(())
    }

    fn apply_default_rule(&self, payload: &ConfigPayload, level: LogLevel) -> Result<()> {
        let pattern = payload.pattern()?;
        self.configs.upsert(
            DEFAULT_CONFIG_ID,
            pattern.as_deref(),
            level.to_str(),
            &CategorySpec::Root,
            None,
        )?;
        Ok(())
    }

    /// Register a host appender for exactly the given categories
    pub fn add_dynamic_appender(
        &self,
        name: &str,
        categories: impl Into<CategorySpec>,
        appender: Box<dyn Appender>,
    ) -> Result<()> {
        self.ensure_running()?;
        self.reconciler.add_dynamic(name, &categories.into(), appender);
        self.status.info(None, format!("dynamic appender '{}' registered", name));
        self.scheduler.signal_changed()
    }

    /// Returns whether an appender was registered under `name`
    pub fn remove_dynamic_appender(&self, name: &str) -> Result<bool> {
        self.ensure_running()?;
        if !self.reconciler.remove_dynamic(name) {
            return Ok(false);
        }
        self.status.info(None, format!("dynamic appender '{}' removed", name));
        self.scheduler.signal_changed()?;
        Ok(true)
    }

    /// Request a reload pass without any configuration change
    pub fn reload(&self) -> Result<()> {
        self.scheduler.signal_changed()
    }

    /// Effective rule for a category
    pub fn resolve(&self, category: &str) -> Option<Arc<LogConfig>> {
        self.configs.resolve(category)
    }

    pub fn config(&self, id: &str) -> Option<Arc<LogConfig>> {
        self.configs.get(id)
    }

    pub fn writer(&self, owner: &str) -> Option<Writer> {
        self.writers.get_by_owner(owner)
    }

    /// Writer at a destination path, relative paths resolved against the
    /// root directory
    pub fn writer_at(&self, path: &str) -> Option<Writer> {
        self.writers.get_by_path(path)
    }

    pub fn status(&self) -> &StatusLog {
        &self.status
    }

    pub fn metrics(&self) -> &ReloadMetrics {
        &self.metrics
    }

    pub fn reconciler(&self) -> &AppenderReconciler {
        &self.reconciler
    }

    pub fn scheduler(&self) -> &ReloadScheduler {
        &self.scheduler
    }

    /// Block until no reload pass is running or pending
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.scheduler.wait_idle(timeout)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let (rules, writers) = self.configs.snapshot_with_writers();

        let mut writer_list: Vec<Writer> = writers.writers().cloned().collect();
        writer_list.sort_by_key(|w| w.id);
        let implicit_writers = writer_list.iter().filter(|w| w.owner.is_implicit()).count();

        let mut rule_list: Vec<LogConfig> = rules.configs().map(|c| c.as_ref().clone()).collect();
        rule_list.sort_by(|a, b| a.id.cmp(&b.id));

        let categories = self.engine.categories();
        let attached_appenders = categories
            .iter()
            .map(|category| self.engine.appenders(category).len())
            .sum();

        StatusSnapshot {
            explicit_writers: writer_list.len() - implicit_writers,
            implicit_writers,
            configs: rule_list.len(),
            categories: categories.len(),
            managed_appenders: self.reconciler.managed_keys().len(),
            attached_appenders,
            dynamic_appenders: self.reconciler.dynamic_names(),
            passes_completed: self.metrics.passes_completed(),
            writers: writer_list,
            rules: rule_list,
            warnings: self
                .status
                .entries()
                .into_iter()
                .filter(|e| e.level >= crate::core::StatusLevel::Warn)
                .collect(),
        }
    }

    /// Stop reloading and close every appender.
    ///
    /// Returns `true` if pending passes finished within `timeout`.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        if self.scheduler.is_stopped() {
            return true;
        }
        let finished = self.scheduler.shutdown(timeout);
        self.reconciler.close_all();
        finished
    }
}

impl Drop for LogConfigManager {
    fn drop(&mut self) {
        if !self.shutdown(DEFAULT_SHUTDOWN_TIMEOUT) {
            tracing::warn!("log configuration manager dropped before reloads finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Destination;
    use crate::registry::payload::{LOG_FILE, LOG_LEVEL, LOG_NAMES};

    fn manager() -> LogConfigManager {
        LogConfigManager::new(ManagerSettings::new().root_dir("/srv/app")).unwrap()
    }

    #[test]
    fn test_bootstrap_installs_default_rule() {
        let manager = manager();
        let default = manager.config(DEFAULT_CONFIG_ID).unwrap();

        assert!(default.owns(""));
        assert_eq!(default.level, LogLevel::Info);
        assert!(manager.writer(DEFAULT_CONFIG_ID).unwrap().path.is_none());
        assert_eq!(manager.metrics().passes_completed(), 1);
    }

    #[test]
    fn test_removing_default_rule_resets_it() {
        let manager = manager();
        manager
            .update_config(
                DEFAULT_CONFIG_ID,
                Some(&ConfigPayload::new().with(LOG_LEVEL, "ERROR").with(LOG_NAMES, "ignored")),
            )
            .unwrap();
        let revised = manager.config(DEFAULT_CONFIG_ID).unwrap();
        assert_eq!(revised.level, LogLevel::Error);
        assert!(revised.owns(""));
        assert!(!revised.owns("ignored"));

        manager.update_config(DEFAULT_CONFIG_ID, None).unwrap();
        assert_eq!(manager.config(DEFAULT_CONFIG_ID).unwrap().level, LogLevel::Info);
    }

    #[test]
    fn test_missing_names_is_rejected() {
        let manager = manager();
        let err = manager
            .update_config("rule", Some(&ConfigPayload::new().with(LOG_LEVEL, "INFO")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCategories { .. }));
    }

    #[test]
    fn test_missing_level_is_rejected() {
        let manager = manager();
        let err = manager
            .update_config("rule", Some(&ConfigPayload::new().with(LOG_NAMES, "a")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLevel { .. }));
        assert!(manager.config("rule").is_none());
    }

    #[test]
    fn test_global_file_moves_default_writer() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LogConfigManager::new(ManagerSettings::new().root_dir(dir.path())).unwrap();
        manager
            .update_global(Some(&ConfigPayload::new().with(LOG_FILE, "logs/error.log")))
            .unwrap();

        let writer = manager.writer(DEFAULT_CONFIG_ID).unwrap();
        assert_eq!(writer.path, Some(dir.path().join("logs/error.log")));
        assert_eq!(manager.config(DEFAULT_CONFIG_ID).unwrap().level, LogLevel::Info);
    }

    #[test]
    fn test_snapshot_serializes() {
        let manager = manager();
        let json = manager.snapshot().to_json().unwrap();
        assert!(json.contains("\"explicit_writers\": 1"));
        assert!(json.contains("log.default"));
    }

    #[test]
    fn test_default_rule_payload_moves_default_writer() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LogConfigManager::new(ManagerSettings::new().root_dir(dir.path())).unwrap();
        manager
            .update_config(
                DEFAULT_CONFIG_ID,
                Some(&ConfigPayload::new().with(LOG_LEVEL, "WARN").with(LOG_FILE, "root.log")),
            )
            .unwrap();

        assert_eq!(manager.config(DEFAULT_CONFIG_ID).unwrap().level, LogLevel::Warn);
        assert!(manager.writer_at("root.log").is_some());
        let root = manager.engine().appenders("");
        assert_eq!(
            root[0].key().unwrap().destination,
            Destination::File(dir.path().join("root.log"))
        );
    }

    #[test]
    fn test_updates_after_shutdown_leave_state_unchanged() {
        let manager = manager();
        assert!(manager.shutdown(Duration::from_secs(1)));

        let err = manager
            .update_config("late", Some(&ConfigPayload::new().with(LOG_LEVEL, "INFO").with(LOG_NAMES, "late")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SchedulerStopped));
        assert!(manager.config("late").is_none());

        let err = manager
            .update_writer("w", Some(&ConfigPayload::new().with(LOG_FILE, "late.log")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::SchedulerStopped));
        assert!(manager.writer("w").is_none());

        assert!(manager.update_global(None).is_err());
        assert_eq!(manager.config(DEFAULT_CONFIG_ID).unwrap().level, LogLevel::Info);
    }
}
