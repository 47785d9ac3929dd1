use std::path::PathBuf;
use std::sync::Arc;

use blob_cache::{CacheStorage, LocalCacheStorage, MemoryCacheStorage};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::platform::{FileScalarStore, MemoryScalarStore, Platform, ScalarStore};

/// Cache name used when a store is not given one.
pub const DEFAULT_CACHE_NAME: &str = "CacheStorageChunkStore";

/// Per-store options.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkStoreOptions {
    /// Total logical length in bytes. Absent or zero means unbounded.
    #[serde(default)]
    pub length: Option<u64>,
    /// Cache namespace, also the generation marker.
    #[serde(default)]
    pub name: Option<String>,
}

impl ChunkStoreOptions {
    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn resolved_name(&self) -> String {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_CACHE_NAME.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Local { directory: PathBuf },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MarkerBackend {
    #[default]
    Memory,
    File { path: PathBuf },
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default)]
    pub marker: MarkerBackend,
}

impl PlatformConfig {
    pub fn build(&self) -> Platform {
        let caches: Arc<dyn CacheStorage> = match &self.backend {
            CacheBackend::Memory => Arc::new(MemoryCacheStorage::new()),
            CacheBackend::Local { directory } => Arc::new(LocalCacheStorage::new(directory.clone())),
        };
        tracing::debug!("using {:?} cache backend", caches);

        let scalars: Arc<dyn ScalarStore> = match &self.marker {
            MarkerBackend::Memory => Arc::new(MemoryScalarStore::new()),
            MarkerBackend::File { path } => Arc::new(FileScalarStore::new(path.clone())),
        };

        Platform::new(Some(caches), scalars)
    }
}

/// Everything needed to open a store, loadable from JSON.
///
/// ```json
/// { "chunk_length": 16384, "length": 1048576, "name": "session-42",
///   "platform": { "backend": { "type": "local", "directory": "/var/cache/chunks" } } }
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub chunk_length: u64,
    #[serde(flatten)]
    pub options: ChunkStoreOptions,
    #[serde(default)]
    pub platform: PlatformConfig,
}

impl StoreConfig {
    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
