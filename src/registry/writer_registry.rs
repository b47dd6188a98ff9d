//! Writer registry: one writer per destination path
//!
//! Writers are indexed by owning configuration id and by absolute path.
//! Mutations that depend on which writers are still referenced by logging
//! rules take the rules' raw destination references as an argument; the
//! caller holds the config registry lock while doing so, which keeps the
//! lock order config registry first, writer registry second.

use super::settings::ManagerSettings;
use super::writer::{Writer, WriterId, WriterOwner};
use super::DEFAULT_CONFIG_ID;
use crate::core::destination::RotationThreshold;
use crate::core::error::{ConfigError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Resolve `raw` against `root` and drop `.`/`..` components lexically
pub fn normalize_path(root: &Path, raw: &str) -> PathBuf {
    let raw = Path::new(raw.trim());
    let joined = if raw.is_absolute() {
        raw.to_path_buf()
    } else {
        root.join(raw)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Rotation parameters applied when nothing explicit is configured
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterDefaults {
    pub max_files: usize,
    pub rotation: RotationThreshold,
}

impl WriterDefaults {
    pub fn from_settings(settings: &ManagerSettings) -> Self {
        Self {
            max_files: settings.default_file_number,
            rotation: RotationThreshold::parse(&settings.default_file_size),
        }
    }
}

/// Consistent copy of the writer tables
#[derive(Debug, Clone)]
pub struct WriterSnapshot {
    root_dir: PathBuf,
    writers: HashMap<WriterId, Writer>,
    by_path: HashMap<PathBuf, WriterId>,
    by_owner: HashMap<String, WriterId>,
    next_id: WriterId,
}

impl WriterSnapshot {
    fn new(root_dir: PathBuf) -> Self {
        Self {
            root_dir,
            writers: HashMap::new(),
            by_path: HashMap::new(),
            by_owner: HashMap::new(),
            next_id: 1,
        }
    }

    pub fn get(&self, id: WriterId) -> Option<&Writer> {
        self.writers.get(&id)
    }

    pub fn by_owner(&self, owner: &str) -> Option<&Writer> {
        self.by_owner.get(owner).and_then(|id| self.writers.get(id))
    }

    pub fn by_path(&self, path: &Path) -> Option<&Writer> {
        self.by_path.get(path).and_then(|id| self.writers.get(id))
    }

    pub fn default_writer(&self) -> Option<&Writer> {
        self.by_owner(DEFAULT_CONFIG_ID)
    }

    pub fn writers(&self) -> impl Iterator<Item = &Writer> {
        self.writers.values()
    }

    pub fn len(&self) -> usize {
        self.writers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writers.is_empty()
    }

    /// Writer a rule's destination reference points at.
    ///
    /// `None` is the default writer; otherwise the reference is tried as an
    /// owning configuration id, then as a path.
    pub fn resolve(&self, reference: Option<&str>) -> Option<&Writer> {
        self.lookup(reference).and_then(|id| self.writers.get(&id))
    }

    fn lookup(&self, reference: Option<&str>) -> Option<WriterId> {
        match reference {
            None => self.by_owner.get(DEFAULT_CONFIG_ID).copied(),
            Some(reference) => self.by_owner.get(reference).copied().or_else(|| {
                self.by_path
                    .get(&normalize_path(&self.root_dir, reference))
                    .copied()
            }),
        }
    }

    fn is_referenced(&self, id: WriterId, references: &[Option<String>]) -> bool {
        references
            .iter()
            .any(|reference| self.lookup(reference.as_deref()) == Some(id))
    }

    fn insert(
        &mut self,
        owner: WriterOwner,
        path: Option<PathBuf>,
        max_files: usize,
        rotation: RotationThreshold,
    ) -> WriterId {
        let id = self.next_id;
        self.next_id += 1;

        if let Some(path) = &path {
            self.by_path.insert(path.clone(), id);
        }
        if let WriterOwner::Explicit(owner) = &owner {
            self.by_owner.insert(owner.clone(), id);
        }
        self.writers.insert(
            id,
            Writer {
                id,
                owner,
                path,
                max_files,
                rotation,
            },
        );
        id
    }

    fn retire(&mut self, id: WriterId) -> Option<Writer> {
        let writer = self.writers.remove(&id)?;
        if let Some(path) = &writer.path {
            self.by_path.remove(path);
        }
        if let WriterOwner::Explicit(owner) = &writer.owner {
            self.by_owner.remove(owner);
        }
        Some(writer)
    }

    /// Demote a writer; retire it unless a rule still points at it, in
    /// which case it falls back to default rotation parameters
    fn release(
        &mut self,
        id: WriterId,
        references: &[Option<String>],
        defaults: &WriterDefaults,
    ) -> Option<Writer> {
        let (owner, is_console) = {
            let writer = self.writers.get(&id)?;
            (writer.owner.id().map(String::from), writer.path.is_none())
        };
        if let Some(owner) = owner {
            self.by_owner.remove(&owner);
        }

        let referenced = !is_console && self.is_referenced(id, references);
        let writer = self.writers.get_mut(&id)?;
        writer.owner = WriterOwner::Implicit;
        if referenced {
            writer.max_files = defaults.max_files;
            writer.rotation = defaults.rotation.clone();
            None
        } else {
            self.retire(id)
        }
    }
}

/// Registry of configured and implicit writers.
///
/// # Example
///
/// ```
/// use log_config_manager::registry::WriterRegistry;
/// use log_config_manager::ManagerSettings;
///
/// let writers = WriterRegistry::new(&ManagerSettings::new().root_dir("/srv"));
/// writers.upsert("audit", Some("logs/audit.log"), Some(3), Some("10mb"), &[]).unwrap();
///
/// let err = writers.upsert("other", Some("/srv/logs/audit.log"), None, None, &[]).unwrap_err();
/// assert!(err.to_string().contains("audit"));
/// ```
pub struct WriterRegistry {
    tables: RwLock<WriterSnapshot>,
    defaults: WriterDefaults,
}

impl WriterRegistry {
    pub fn new(settings: &ManagerSettings) -> Self {
        Self {
            tables: RwLock::new(WriterSnapshot::new(settings.root_dir.clone())),
            defaults: WriterDefaults::from_settings(settings),
        }
    }

    pub fn defaults(&self) -> &WriterDefaults {
        &self.defaults
    }

    /// Absolute form of a destination name
    pub fn normalize(&self, raw: &str) -> PathBuf {
        normalize_path(&self.tables.read().root_dir, raw)
    }

    /// Create, promote or update the writer owned by `owner`.
    ///
    /// `references` are the destination references of all current rules.
    /// Fails with `DestinationConflict` when another configuration owns
    /// the writer at the target path; nothing changes in that case.
    pub fn upsert(
        &self,
        owner: &str,
        file: Option<&str>,
        max_files: Option<usize>,
        rotation: Option<&str>,
        references: &[Option<String>],
    ) -> Result<WriterId> {
        let mut tables = self.tables.write();

        let path = file.map(|file| normalize_path(&tables.root_dir, file));
        let max_files = max_files.unwrap_or(self.defaults.max_files);
        let rotation = rotation
            .map(RotationThreshold::parse)
            .unwrap_or_else(|| self.defaults.rotation.clone());

        let current = tables.by_owner.get(owner).copied();
        let target = match &path {
            Some(path) => tables.by_path.get(path).copied(),
            None => current.filter(|id| tables.writers.get(id).is_some_and(|w| w.path.is_none())),
        };

        if let Some(existing) = target.and_then(|id| tables.writers.get(&id)) {
            if let WriterOwner::Explicit(other) = &existing.owner {
                if other != owner {
                    let shown = path.as_deref().unwrap_or(Path::new("console"));
                    return Err(ConfigError::destination_conflict(
                        shown.display().to_string(),
                        other.clone(),
                    ));
                }
            }
        }

        if let Some(current) = current.filter(|id| Some(*id) != target) {
            if let Some(retired) = tables.release(current, references, &self.defaults) {
                tracing::debug!(owner, writer = retired.id, "released previous destination");
            }
        }

        let id = match target {
            Some(id) => {
                if let Some(writer) = tables.writers.get_mut(&id) {
                    if writer.owner.is_implicit() {
                        tracing::debug!(owner, writer = id, "promoting implicit writer");
                    }
                    writer.owner = WriterOwner::Explicit(owner.to_string());
                    writer.max_files = max_files;
                    writer.rotation = rotation;
                }
                tables.by_owner.insert(owner.to_string(), id);
                id
            }
            None => tables.insert(
                WriterOwner::Explicit(owner.to_string()),
                path,
                max_files,
                rotation,
            ),
        };
        Ok(id)
    }

    /// Drop `owner`'s claim on its writer; returns whether it had one
    pub fn remove(&self, owner: &str, references: &[Option<String>]) -> bool {
        let mut tables = self.tables.write();
        let Some(id) = tables.by_owner.get(owner).copied() else {
            return false;
        };
        tables.release(id, references, &self.defaults);
        true
    }

    /// Writer for a rule's destination reference, created implicitly with
    /// default rotation parameters when unknown
    pub fn resolve_or_create(&self, reference: Option<&str>) -> WriterId {
        let mut tables = self.tables.write();
        if let Some(id) = tables.lookup(reference) {
            return id;
        }

        let (owner, path) = match reference {
            None => (WriterOwner::Explicit(DEFAULT_CONFIG_ID.to_string()), None),
            Some(reference) => (
                WriterOwner::Implicit,
                Some(normalize_path(&tables.root_dir, reference)),
            ),
        };
        tables.insert(
            owner,
            path,
            self.defaults.max_files,
            self.defaults.rotation.clone(),
        )
    }

    /// Retire implicit writers none of `references` resolves to
    pub fn sweep(&self, references: &[Option<String>]) -> Vec<Writer> {
        let mut tables = self.tables.write();
        let orphans: Vec<WriterId> = tables
            .writers
            .values()
            .filter(|w| w.owner.is_implicit() && !tables.is_referenced(w.id, references))
            .map(|w| w.id)
            .collect();

        orphans
            .into_iter()
            .filter_map(|id| tables.retire(id))
            .collect()
    }

    pub fn snapshot(&self) -> WriterSnapshot {
        self.tables.read().clone()
    }

    pub fn get_by_owner(&self, owner: &str) -> Option<Writer> {
        self.tables.read().by_owner(owner).cloned()
    }

    pub fn get_by_path(&self, raw: &str) -> Option<Writer> {
        let tables = self.tables.read();
        let path = normalize_path(&tables.root_dir, raw);
        tables.by_path(&path).cloned()
    }

    pub fn len(&self) -> usize {
        self.tables.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> WriterRegistry {
        WriterRegistry::new(&ManagerSettings::new().root_dir("/srv/app"))
    }

    fn refs(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some(v.to_string())).collect()
    }

    #[test]
    fn test_normalize_path() {
        let root = Path::new("/srv/app");
        assert_eq!(normalize_path(root, "logs/a.log"), PathBuf::from("/srv/app/logs/a.log"));
        assert_eq!(normalize_path(root, "./logs/../b.log"), PathBuf::from("/srv/app/b.log"));
        assert_eq!(normalize_path(root, "/var/log/c.log"), PathBuf::from("/var/log/c.log"));
    }

    #[test]
    fn test_conflict_leaves_state_unchanged() {
        let writers = registry();
        writers.upsert("A", Some("logs/a.log"), Some(3), None, &[]).unwrap();

        let err = writers.upsert("B", Some("logs/./a.log"), Some(9), None, &[]).unwrap_err();
        assert!(matches!(err, ConfigError::DestinationConflict { ref owner, .. } if owner == "A"));

        let writer = writers.get_by_path("logs/a.log").unwrap();
        assert_eq!(writer.owner, WriterOwner::Explicit("A".to_string()));
        assert_eq!(writer.max_files, 3);
        assert!(writers.get_by_owner("B").is_none());
    }

    #[test]
    fn test_implicit_writer_is_promoted() {
        let writers = registry();
        let implicit = writers.resolve_or_create(Some("logs/shared.log"));
        assert!(writers.get_by_path("logs/shared.log").unwrap().owner.is_implicit());

        let promoted = writers
            .upsert("W", Some("/srv/app/logs/shared.log"), Some(2), Some("1mb"), &[])
            .unwrap();

        assert_eq!(promoted, implicit);
        assert_eq!(writers.len(), 1);
        let writer = writers.get_by_owner("W").unwrap();
        assert_eq!(writer.rotation, RotationThreshold::Size { max_bytes: 1024 * 1024 });
    }

    #[test]
    fn test_update_in_place_keeps_identity() {
        let writers = registry();
        let first = writers.upsert("W", Some("a.log"), Some(2), None, &[]).unwrap();
        let second = writers.upsert("W", Some("a.log"), Some(7), None, &[]).unwrap();

        assert_eq!(first, second);
        assert_eq!(writers.get_by_owner("W").unwrap().max_files, 7);
    }

    #[test]
    fn test_remove_resets_referenced_writer() {
        let writers = registry();
        let id = writers.upsert("W", Some("a.log"), Some(9), Some("5mb"), &[]).unwrap();

        assert!(writers.remove("W", &refs(&["a.log"])));

        let writer = writers.get_by_path("a.log").unwrap();
        assert_eq!(writer.id, id);
        assert!(writer.owner.is_implicit());
        assert_eq!(writer.max_files, writers.defaults().max_files);
        assert_eq!(writer.rotation, writers.defaults().rotation);
    }

    #[test]
    fn test_remove_retires_unreferenced_writer() {
        let writers = registry();
        writers.upsert("W", Some("a.log"), None, None, &[]).unwrap();

        assert!(writers.remove("W", &refs(&["b.log"])));
        assert!(writers.get_by_path("a.log").is_none());
        assert!(!writers.remove("W", &[]));
    }

    #[test]
    fn test_reference_by_owner_id_does_not_keep_writer() {
        let writers = registry();
        writers.upsert("W", Some("a.log"), None, None, &[]).unwrap();

        writers.remove("W", &refs(&["W"]));
        assert!(writers.is_empty());
    }

    #[test]
    fn test_moving_writer_releases_old_path() {
        let writers = registry();
        writers.upsert("W", Some("old.log"), None, None, &[]).unwrap();
        writers.upsert("W", Some("new.log"), None, None, &refs(&["old.log"])).unwrap();

        assert!(writers.get_by_path("old.log").unwrap().owner.is_implicit());
        assert_eq!(writers.get_by_owner("W").unwrap().path, Some(PathBuf::from("/srv/app/new.log")));

        writers.upsert("W", Some("third.log"), None, None, &[]).unwrap();
        let retired = writers.sweep(&[]);
        assert_eq!(retired.len(), 1);
        assert!(writers.get_by_path("old.log").is_none());
        assert!(writers.get_by_path("new.log").is_none());
    }

    #[test]
    fn test_default_reference_creates_console_writer_once() {
        let writers = registry();
        let first = writers.resolve_or_create(None);
        let second = writers.resolve_or_create(None);

        assert_eq!(first, second);
        let snapshot = writers.snapshot();
        let default = snapshot.default_writer().unwrap();
        assert!(default.path.is_none());
        assert!(snapshot.resolve(None).is_some());
    }

    #[test]
    fn test_sweep_keeps_referenced_implicit_writers() {
        let writers = registry();
        writers.resolve_or_create(Some("kept.log"));
        writers.resolve_or_create(Some("dropped.log"));

        let retired = writers.sweep(&refs(&["/srv/app/kept.log"]));

        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].path, Some(PathBuf::from("/srv/app/dropped.log")));
        assert!(writers.get_by_path("kept.log").is_some());
    }
}
