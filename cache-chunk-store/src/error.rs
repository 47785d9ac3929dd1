use blob_cache::CacheError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChunkStoreError>;

#[derive(Debug, Error)]
pub enum ChunkStoreError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("not supported on this platform: no blob cache available")]
    UnsupportedPlatform,

    #[error("storage is closed")]
    Closed,

    #[error("chunk {index} length must be {expected}, got {actual}")]
    ChunkSize { index: u64, expected: usize, actual: usize },

    #[error("chunk {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to parse store configuration")]
    ConfigFormat(#[from] serde_json::Error),

    #[error("cache eviction task failed")]
    Eviction(#[from] tokio::task::JoinError),
}

impl ChunkStoreError {
    /// True when a chunk has simply not been written (or was erased).
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChunkStoreError::NotFound(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, ChunkStoreError::Closed)
    }
}
