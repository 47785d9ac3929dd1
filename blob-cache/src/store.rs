use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CacheResult;
use crate::response::CacheResponse;

/// A single named cache: string keys mapped to stored responses.
#[async_trait]
pub trait BlobCache: Send + Sync + Debug {
    /// Stores `response` under `key`, replacing any previous entry.
    async fn put(&self, key: &str, response: CacheResponse) -> CacheResult<()>;

    /// Looks up the response stored under `key`.
    async fn match_key(&self, key: &str) -> CacheResult<Option<CacheResponse>>;

    /// Lists every key currently stored.
    async fn keys(&self) -> CacheResult<Vec<String>>;

    /// Removes `key`, returning whether an entry existed.
    async fn delete(&self, key: &str) -> CacheResult<bool>;
}

/// Opens (creating on first use) caches by name.
#[async_trait]
pub trait CacheStorage: Send + Sync + Debug {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn BlobCache>>;
}
