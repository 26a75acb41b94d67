//! Storage backends for the versioned model store

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ensure_parent;
use crate::error::{PipelineError, Result};

/// Storage backend for model versions.
///
/// Keys are paths relative to [`ModelStorage::root`], e.g. `3/model.bin`.
pub trait ModelStorage: Send + Sync {
    /// Root every key is resolved against
    fn root(&self) -> &Path;

    /// Names of the top-level entries under the root
    fn list(&self) -> Result<Vec<String>>;

    fn exists(&self, key: &Path) -> bool;

    fn read(&self, key: &Path) -> Result<Vec<u8>>;

    /// Write a blob, creating intermediate directories
    fn write(&self, key: &Path, bytes: &[u8]) -> Result<()>;

    /// Absolute location of a key
    fn locate(&self, key: &Path) -> PathBuf {
        self.root().join(key)
    }
}

/// Local file system storage backend
#[derive(Debug, Clone)]
pub struct FsModelStorage {
    base_dir: PathBuf,
}

impl FsModelStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl ModelStorage for FsModelStorage {
    fn root(&self) -> &Path {
        &self.base_dir
    }

    fn list(&self) -> Result<Vec<String>> {
        // A model dir that was never created simply holds no versions
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    fn exists(&self, key: &Path) -> bool {
        self.base_dir.join(key).is_file()
    }

    fn read(&self, key: &Path) -> Result<Vec<u8>> {
        let path = self.base_dir.join(key);
        fs::read(&path)
            .map_err(|e| PipelineError::NotFound(format!("{}: {}", path.display(), e)))
    }

    fn write(&self, key: &Path, bytes: &[u8]) -> Result<()> {
        let path = self.base_dir.join(key);
        ensure_parent(&path)?;
        fs::write(&path, bytes)?;
        Ok(())
    }
}

/// In-memory storage, handy for tests and dry runs
#[derive(Debug, Default)]
pub struct InMemoryModelStorage {
    root: PathBuf,
    blobs: RwLock<BTreeMap<PathBuf, Vec<u8>>>,
}

impl InMemoryModelStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            blobs: RwLock::new(BTreeMap::new()),
        }
    }
}

impl ModelStorage for InMemoryModelStorage {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list(&self) -> Result<Vec<String>> {
        let blobs = self.blobs.read();
        let mut names: Vec<String> = blobs
            .keys()
            .filter_map(|key| key.components().next())
            .filter_map(|first| first.as_os_str().to_str().map(str::to_string))
            .collect();
        names.dedup();
        Ok(names)
    }

    fn exists(&self, key: &Path) -> bool {
        self.blobs.read().contains_key(key)
    }

    fn read(&self, key: &Path) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| PipelineError::NotFound(key.display().to_string()))
    }

    fn write(&self, key: &Path, bytes: &[u8]) -> Result<()> {
        self.blobs.write().insert(key.to_path_buf(), bytes.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fs_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsModelStorage::new(dir.path().join("saved_models"));

        assert!(storage.list().unwrap().is_empty());
        storage.write(Path::new("0/model.bin"), b"abc").unwrap();

        assert!(storage.exists(Path::new("0/model.bin")));
        assert!(!storage.exists(Path::new("0")));
        assert_eq!(storage.read(Path::new("0/model.bin")).unwrap(), b"abc");
        assert_eq!(storage.list().unwrap(), vec!["0".to_string()]);
    }

    #[test]
    fn test_fs_storage_missing_read() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsModelStorage::new(dir.path());
        assert!(matches!(
            storage.read(Path::new("9/model.bin")),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn test_in_memory_storage_lists_top_level_entries() {
        let storage = InMemoryModelStorage::new("mem");
        storage.write(Path::new("1/model.bin"), b"x").unwrap();
        storage.write(Path::new("1/notes.txt"), b"y").unwrap();
        storage.write(Path::new("2/model.bin"), b"z").unwrap();

        assert_eq!(storage.list().unwrap(), vec!["1".to_string(), "2".to_string()]);
        assert_eq!(storage.locate(Path::new("2/model.bin")), PathBuf::from("mem/2/model.bin"));
    }
}
