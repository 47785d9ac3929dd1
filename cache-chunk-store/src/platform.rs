use std::collections::BTreeMap;
use std::fmt::Debug;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use blob_cache::{CacheStorage, LocalCacheStorage, MemoryCacheStorage};

use crate::generation::GenerationRegistry;

/// A small synchronous, process-wide string store.
pub trait ScalarStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> io::Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> io::Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryScalarStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryScalarStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScalarStore for MemoryScalarStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Scalars kept as a JSON object in a single file, so they survive restarts.
#[derive(Debug)]
pub struct FileScalarStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileScalarStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> io::Result<BTreeMap<String, String>> {
        match std::fs::read(&self.path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|e| io::Error::new(ErrorKind::InvalidData, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e),
        }
    }
}

impl ScalarStore for FileScalarStore {
    fn get(&self, key: &str) -> io::Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_vec_pretty(&values).map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, encoded)?;
        std::fs::rename(&temp_path, &self.path)
    }
}

/// The host capabilities a chunk store runs against.
#[derive(Debug, Clone)]
pub struct Platform {
    caches: Option<Arc<dyn CacheStorage>>,
    generations: Arc<GenerationRegistry>,
}

impl Platform {
    /// `caches` of `None` models a host without blob cache support.
    pub fn new(caches: Option<Arc<dyn CacheStorage>>, scalars: Arc<dyn ScalarStore>) -> Self {
        Self { caches, generations: Arc::new(GenerationRegistry::new(scalars)) }
    }

    pub fn in_memory() -> Self {
        Self::new(Some(Arc::new(MemoryCacheStorage::new())), Arc::new(MemoryScalarStore::new()))
    }

    /// Caches under `<directory>/caches`, the generation marker in `<directory>/scalars.json`.
    pub fn local(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();
        Self::new(
            Some(Arc::new(LocalCacheStorage::new(directory.join("caches")))),
            Arc::new(FileScalarStore::new(directory.join("scalars.json"))),
        )
    }

    pub fn caches(&self) -> Option<&Arc<dyn CacheStorage>> {
        self.caches.as_ref()
    }

    pub fn generations(&self) -> &Arc<GenerationRegistry> {
        &self.generations
    }
}
