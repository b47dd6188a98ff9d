//! Appender reconciler: rebuilds category wiring from the registries
//!
//! Managed appenders are shared by `(destination, template)`: every rule
//! resolving to the same writer with the same template renders through one
//! proxy. Proxies that no category uses at the end of a pass are closed in
//! one batch.

use crate::core::appender::{AppenderFactory, AppenderHandle, AppenderKey, AppenderOrigin, AppenderProxy};
use crate::core::destination::WriterSpec;
use crate::core::engine::LogEngine;
use crate::core::metrics::ReloadMetrics;
use crate::core::status::StatusLog;
use crate::core::Appender;
use crate::registry::category::CategorySpec;
use crate::registry::config_registry::ConfigSnapshot;
use crate::registry::writer_registry::WriterSnapshot;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub categories: usize,
    pub managed_appenders: usize,
    pub created: usize,
    pub reconfigured: usize,
    pub closed: usize,
}

struct DynamicAppender {
    categories: BTreeSet<String>,
    handle: AppenderHandle,
}

#[derive(Default)]
struct DynamicRegistry {
    active: HashMap<String, DynamicAppender>,
    retired: Vec<AppenderHandle>,
}

pub struct AppenderReconciler {
    engine: Arc<dyn LogEngine>,
    factory: Arc<dyn AppenderFactory>,
    status: Arc<StatusLog>,
    metrics: Arc<ReloadMetrics>,
    proxies: Mutex<HashMap<AppenderKey, AppenderHandle>>,
    dynamics: Mutex<DynamicRegistry>,
}

impl AppenderReconciler {
    pub fn new(
        engine: Arc<dyn LogEngine>,
        factory: Arc<dyn AppenderFactory>,
        status: Arc<StatusLog>,
        metrics: Arc<ReloadMetrics>,
    ) -> Self {
        Self {
            engine,
            factory,
            status,
            metrics,
            proxies: Mutex::new(HashMap::new()),
            dynamics: Mutex::new(DynamicRegistry::default()),
        }
    }

    /// Register a host appender for exactly `categories`, replacing any
    /// appender registered under the same name. Takes effect on the next pass.
    pub fn add_dynamic(&self, name: &str, categories: &CategorySpec, appender: Box<dyn Appender>) {
        let handle = Arc::new(AppenderProxy::dynamic(name, appender));
        let entry = DynamicAppender {
            categories: categories.decompose(),
            handle,
        };
        let mut dynamics = self.dynamics.lock();
        if let Some(previous) = dynamics.active.insert(name.to_string(), entry) {
            dynamics.retired.push(previous.handle);
        }
    }

    /// Returns whether an appender was registered under `name`
    pub fn remove_dynamic(&self, name: &str) -> bool {
        let mut dynamics = self.dynamics.lock();
        match dynamics.active.remove(name) {
            Some(previous) => {
                dynamics.retired.push(previous.handle);
                true
            }
            None => false,
        }
    }

    pub fn dynamic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dynamics.lock().active.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn managed_keys(&self) -> Vec<AppenderKey> {
        self.proxies.lock().keys().cloned().collect()
    }

    /// Shared proxy currently serving `key`
    pub fn managed(&self, key: &AppenderKey) -> Option<AppenderHandle> {
        self.proxies.lock().get(key).cloned()
    }

    /// Apply the registries to every live category of the engine
    pub fn reconcile(&self, configs: &ConfigSnapshot, writers: &WriterSnapshot) -> PassSummary {
        let mut proxies = self.proxies.lock();
        let (dynamics, retired): (Vec<(BTreeSet<String>, AppenderHandle)>, Vec<AppenderHandle>) = {
            let mut registry = self.dynamics.lock();
            let active = registry
                .active
                .values()
                .map(|d| (d.categories.clone(), Arc::clone(&d.handle)))
                .collect();
            (active, std::mem::take(&mut registry.retired))
        };
        let known_dynamic: HashSet<u64> = dynamics
            .iter()
            .map(|(_, h)| h.id())
            .chain(retired.iter().map(|h| h.id()))
            .collect();

        for category in configs.categories() {
            self.engine.ensure_category(category);
        }
        for (categories, _) in &dynamics {
            for category in categories {
                self.engine.ensure_category(category);
            }
        }

        let mut summary = PassSummary::default();
        let mut used: HashSet<u64> = HashSet::new();
        let mut touched: HashSet<AppenderKey> = HashSet::new();
        let mut failed: HashSet<AppenderKey> = HashSet::new();
        let mut warned: HashSet<String> = HashSet::new();

        let categories = self.engine.categories();
        summary.categories = categories.len();

        for category in &categories {
            let managed = match configs.resolve(category) {
                Some(config) => {
                    self.engine.set_level(category, Some(config.level));

                    let writer = match writers.resolve(config.destination.as_deref()) {
                        Some(writer) => Some(writer),
                        None => {
                            if warned.insert(config.id.clone()) {
                                self.status.warn(
                                    Some(&config.id),
                                    format!(
                                        "destination '{}' is not configured, using the default writer",
                                        config.destination.as_deref().unwrap_or_default()
                                    ),
                                );
                            }
                            writers.default_writer()
                        }
                    };

                    writer.and_then(|writer| {
                        let key = AppenderKey {
                            destination: writer.destination(),
                            template: config.pattern.clone(),
                        };
                        self.obtain(
                            &mut proxies,
                            key,
                            writer.spec(),
                            &config.id,
                            &mut touched,
                            &mut failed,
                            &mut summary,
                        )
                    })
                }
                None => {
                    self.engine.set_level(category, None);
                    None
                }
            };

            let mut desired: Vec<AppenderHandle> = Vec::new();
            if let Some(handle) = managed {
                used.insert(handle.id());
                desired.push(handle);
            }
            for (names, handle) in &dynamics {
                if names.contains(category) {
                    desired.push(Arc::clone(handle));
                }
            }

            for attached in self.engine.appenders(category) {
                if desired.iter().any(|d| d.id() == attached.id()) {
                    continue;
                }
                let ours = match attached.origin() {
                    AppenderOrigin::Managed(_) => true,
                    AppenderOrigin::Dynamic(_) => known_dynamic.contains(&attached.id()),
                };
                if ours {
                    self.engine.detach(category, attached.id());
                }
            }
            for handle in desired {
                self.engine.attach(category, handle);
            }
        }

        proxies.retain(|key, handle| {
            if used.contains(&handle.id()) {
                return true;
            }
            if let Err(e) = handle.close() {
                self.status.error(None, format!("closing appender {} failed: {}", key, e));
            }
            self.metrics.record_appender_closed();
            summary.closed += 1;
            false
        });
        for handle in retired {
            if let Err(e) = handle.close() {
                self.status.error(None, format!("closing dynamic appender failed: {}", e));
            }
        }

        summary.managed_appenders = proxies.len();
        summary
    }

    #[allow(clippy::too_many_arguments)]
    fn obtain(
        &self,
        proxies: &mut HashMap<AppenderKey, AppenderHandle>,
        key: AppenderKey,
        spec: WriterSpec,
        config_id: &str,
        touched: &mut HashSet<AppenderKey>,
        failed: &mut HashSet<AppenderKey>,
        summary: &mut PassSummary,
    ) -> Option<AppenderHandle> {
        if failed.contains(&key) {
            return None;
        }

        if let Some(handle) = proxies.get(&key) {
            let is_file = key.destination.path().is_some();
            if is_file && handle.spec().as_ref() != Some(&spec) && touched.insert(key.clone()) {
                match self.factory.create(&spec, &key.template) {
                    Ok(delegate) => {
                        if let Err(e) = handle.replace_delegate(spec, delegate) {
                            self.status.error(Some(config_id), format!("closing previous appender for {} failed: {}", key, e));
                        }
                        self.metrics.record_appender_reconfigured();
                        summary.reconfigured += 1;
                        self.status.info(Some(config_id), format!("reconfigured appender {}", key));
                    }
                    Err(e) => {
                        self.status.warn(Some(config_id), format!("cannot reconfigure appender {}: {}", key, e));
                    }
                }
            }
            return Some(Arc::clone(handle));
        }

        match self.factory.create(&spec, &key.template) {
            Ok(delegate) => {
                let handle = Arc::new(AppenderProxy::managed(key.clone(), spec, delegate));
                self.status.info(
                    Some(config_id),
                    format!("created appender {} ({})", key, handle.delegate_name()),
                );
                self.metrics.record_appender_created();
                summary.created += 1;
                touched.insert(key.clone());
                proxies.insert(key, Arc::clone(&handle));
                Some(handle)
            }
            Err(e) => {
                self.status.warn(Some(config_id), format!("cannot create appender for {}: {}", key.destination, e));
                failed.insert(key);
                None
            }
        }
    }

    /// Detach and close every appender this reconciler wired
    pub fn close_all(&self) {
        let mut proxies = self.proxies.lock();
        let mut dynamics = self.dynamics.lock();

        let mut handles: Vec<AppenderHandle> = proxies.drain().map(|(_, h)| h).collect();
        handles.extend(dynamics.active.drain().map(|(_, d)| d.handle));
        handles.append(&mut dynamics.retired);

        let ids: HashSet<u64> = handles.iter().map(|h| h.id()).collect();
        for category in self.engine.categories() {
            for attached in self.engine.appenders(&category) {
                if ids.contains(&attached.id()) {
                    self.engine.detach(&category, attached.id());
                }
            }
        }
        for handle in handles {
            if handle.is_managed() {
                self.metrics.record_appender_closed();
            }
            if let Err(e) = handle.close() {
                self.status.error(None, format!("closing appender failed: {}", e));
            }
        }
    }
}
