//! Model version resolution
//!
//! Saved models live under `model_dir/<version>/model.bin`, where
//! `<version>` is a non-negative integer. The storage is the source of
//! truth: every call rebuilds a [`VersionArena`] from it, so versions
//! pushed by another process are seen immediately. Callers that need a
//! stable answer for one request should snapshot the path once.

mod storage;

pub use storage::{FsModelStorage, InMemoryModelStorage, ModelStorage};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::config::MODEL_FILE_NAME;
use crate::error::{PipelineError, Result};
use crate::training::TrainedModelBundle;

/// One saved model version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRecord {
    pub version: u64,
    /// Model file key relative to the storage root
    pub key: PathBuf,
}

/// Ordered index of the versions present in storage
#[derive(Debug, Clone, Default)]
pub struct VersionArena {
    records: BTreeMap<u64, VersionRecord>,
}

impl VersionArena {
    /// Scan storage; entries that are not integers or hold no model file are skipped
    pub fn scan(storage: &dyn ModelStorage) -> Result<Self> {
        let mut records = BTreeMap::new();
        for name in storage.list()? {
            let Ok(version) = name.parse::<u64>() else {
                debug!(entry = %name, "Skipping non-version entry in model dir");
                continue;
            };
            let key = version_key(version);
            if storage.exists(&key) {
                records.insert(version, VersionRecord { version, key });
            } else {
                debug!(version, "Skipping version without a model file");
            }
        }
        Ok(Self { records })
    }

    pub fn latest(&self) -> Option<&VersionRecord> {
        self.records.values().next_back()
    }

    pub fn get(&self, version: u64) -> Option<&VersionRecord> {
        self.records.get(&version)
    }

    pub fn versions(&self) -> Vec<u64> {
        self.records.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

fn version_key(version: u64) -> PathBuf {
    Path::new(&version.to_string()).join(MODEL_FILE_NAME)
}

/// Resolves saved model versions over a [`ModelStorage`]
#[derive(Clone)]
pub struct ModelResolver {
    storage: Arc<dyn ModelStorage>,
}

impl ModelResolver {
    pub fn new(storage: Arc<dyn ModelStorage>) -> Self {
        Self { storage }
    }

    /// Resolver over a local model directory
    pub fn from_dir(model_dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FsModelStorage::new(model_dir)))
    }

    pub fn storage(&self) -> &Arc<dyn ModelStorage> {
        &self.storage
    }

    pub fn model_dir(&self) -> &Path {
        self.storage.root()
    }

    fn arena(&self) -> Result<VersionArena> {
        VersionArena::scan(self.storage.as_ref())
    }

    /// Saved versions in ascending order
    pub fn versions(&self) -> Result<Vec<u64>> {
        Ok(self.arena()?.versions())
    }

    pub fn latest_version(&self) -> Result<Option<u64>> {
        Ok(self.arena()?.latest().map(|r| r.version))
    }

    pub fn is_model_exists(&self) -> Result<bool> {
        Ok(!self.arena()?.is_empty())
    }

    /// Path of the highest version's model file
    pub fn get_latest_model_path(&self) -> Result<PathBuf> {
        self.arena()?
            .latest()
            .map(|r| self.storage.locate(&r.key))
            .ok_or_else(|| {
                PipelineError::NotFound(format!(
                    "No model is available in {}",
                    self.model_dir().display()
                ))
            })
    }

    /// The model served to predictions; currently the latest version
    pub fn get_best_model_path(&self) -> Result<PathBuf> {
        self.get_latest_model_path()
    }

    /// Directory of the highest version, `None` when nothing is saved
    pub fn get_latest_model_dir(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .arena()?
            .latest()
            .map(|r| self.model_dir().join(r.version.to_string())))
    }

    /// Latest version plus one, or 0 when nothing is saved
    pub fn next_version(&self) -> Result<u64> {
        match self.arena()?.latest() {
            None => Ok(0),
            Some(r) => r.version.checked_add(1).ok_or_else(|| {
                PipelineError::ConfigError(format!(
                    "Model version {} in {} leaves no room for a next version",
                    r.version,
                    self.model_dir().display()
                ))
            }),
        }
    }

    /// Path of the model file for a specific version
    pub fn model_path(&self, version: u64) -> PathBuf {
        self.storage.locate(&version_key(version))
    }

    /// Relative key where the next pushed model belongs
    pub fn next_model_key(&self) -> Result<PathBuf> {
        Ok(version_key(self.next_version()?))
    }

    pub fn next_model_path(&self) -> Result<PathBuf> {
        Ok(self.storage.locate(&self.next_model_key()?))
    }

    pub fn load_bundle(&self, version: u64) -> Result<TrainedModelBundle> {
        let bytes = self.storage.read(&version_key(version))?;
        TrainedModelBundle::from_bytes(&bytes)
    }

    /// Load the served model bundle, `NotFound` when none exists
    pub fn load_best_bundle(&self) -> Result<TrainedModelBundle> {
        let version = self.latest_version()?.ok_or_else(|| {
            PipelineError::NotFound(format!(
                "No model is available in {}",
                self.model_dir().display()
            ))
        })?;
        self.load_bundle(version)
    }

    /// Write a serialized bundle as the next version, returning its path
    pub fn push(&self, bytes: &[u8]) -> Result<PathBuf> {
        let key = self.next_model_key()?;
        self.storage.write(&key, bytes)?;
        Ok(self.storage.locate(&key))
    }
}

impl std::fmt::Debug for ModelResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelResolver")
            .field("model_dir", &self.model_dir())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn resolver_with(versions: &[&str]) -> (tempfile::TempDir, ModelResolver) {
        let dir = tempfile::tempdir().unwrap();
        for v in versions {
            let d = dir.path().join(v);
            fs::create_dir_all(&d).unwrap();
            fs::write(d.join(MODEL_FILE_NAME), b"m").unwrap();
        }
        let resolver = ModelResolver::from_dir(dir.path());
        (dir, resolver)
    }

    #[test]
    fn test_latest_and_next_version() {
        let (dir, resolver) = resolver_with(&["0", "1", "3"]);

        assert!(resolver.is_model_exists().unwrap());
        assert_eq!(resolver.versions().unwrap(), vec![0, 1, 3]);
        assert_eq!(
            resolver.get_latest_model_path().unwrap(),
            dir.path().join("3").join(MODEL_FILE_NAME)
        );
        assert_eq!(resolver.get_best_model_path().unwrap(), resolver.get_latest_model_path().unwrap());
        assert_eq!(resolver.get_latest_model_dir().unwrap(), Some(dir.path().join("3")));
        assert_eq!(resolver.next_version().unwrap(), 4);
        assert_eq!(resolver.next_model_path().unwrap(), dir.path().join("4").join(MODEL_FILE_NAME));
    }

    #[test]
    fn test_versions_sort_numerically() {
        let (_dir, resolver) = resolver_with(&["2", "10", "9"]);
        assert_eq!(resolver.latest_version().unwrap(), Some(10));
    }

    #[test]
    fn test_empty_store() {
        let (dir, resolver) = resolver_with(&[]);

        assert!(!resolver.is_model_exists().unwrap());
        assert_eq!(resolver.next_version().unwrap(), 0);
        assert_eq!(resolver.get_latest_model_dir().unwrap(), None);
        assert!(matches!(resolver.get_latest_model_path(), Err(PipelineError::NotFound(_))));
        assert!(matches!(resolver.load_best_bundle(), Err(PipelineError::NotFound(_))));
        assert_eq!(resolver.next_model_path().unwrap(), dir.path().join("0").join(MODEL_FILE_NAME));
    }

    #[test]
    fn test_missing_model_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = ModelResolver::from_dir(dir.path().join("never_created"));
        assert!(!resolver.is_model_exists().unwrap());
        assert_eq!(resolver.next_version().unwrap(), 0);
    }

    #[test]
    fn test_non_numeric_and_empty_entries_are_ignored() {
        let (dir, resolver) = resolver_with(&["1", "latest", "-2"]);
        fs::create_dir_all(dir.path().join("5")).unwrap();
        fs::write(dir.path().join("7"), b"not a dir").unwrap();

        assert_eq!(resolver.versions().unwrap(), vec![1]);
        assert_eq!(resolver.next_version().unwrap(), 2);
    }

    #[test]
    fn test_next_version_overflow_errors() {
        let (dir, resolver) = resolver_with(&["3", &u64::MAX.to_string()]);

        assert_eq!(resolver.latest_version().unwrap(), Some(u64::MAX));
        assert!(matches!(resolver.next_version(), Err(PipelineError::ConfigError(_))));
        assert!(matches!(resolver.push(b"m"), Err(PipelineError::ConfigError(_))));
        // Nothing was overwritten
        assert!(!dir.path().join("0").exists());
        assert_eq!(resolver.model_path(3), dir.path().join("3").join(MODEL_FILE_NAME));
    }

    #[test]
    fn test_push_appends_next_version() {
        let storage = Arc::new(InMemoryModelStorage::new("models"));
        let resolver = ModelResolver::new(storage.clone());

        assert_eq!(resolver.push(b"a").unwrap(), PathBuf::from("models/0/model.bin"));
        assert_eq!(resolver.push(b"b").unwrap(), PathBuf::from("models/1/model.bin"));
        assert_eq!(resolver.versions().unwrap(), vec![0, 1]);
        assert_eq!(storage.read(Path::new("1/model.bin")).unwrap(), b"b");
    }
}
