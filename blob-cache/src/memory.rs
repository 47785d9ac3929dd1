use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::error::CacheResult;
use crate::response::{CacheResponse, ResponseBody, ResponseHead};
use crate::store::{BlobCache, CacheStorage};

#[derive(Debug, Clone)]
struct StoredEntry {
    head: ResponseHead,
    body: Bytes,
}

/// A process-local cache. Bodies are materialized on `put`.
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<BTreeMap<String, StoredEntry>>,
    read_piece_size: Option<usize>,
}

impl MemoryCache {
    fn new(read_piece_size: Option<usize>) -> Self {
        Self { entries: RwLock::new(BTreeMap::new()), read_piece_size }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl BlobCache for MemoryCache {
    async fn put(&self, key: &str, response: CacheResponse) -> CacheResult<()> {
        let (head, body) = response.into_parts();
        let body = body.collect().await?;
        self.entries.write().await.insert(key.to_string(), StoredEntry { head, body });
        Ok(())
    }

    async fn match_key(&self, key: &str) -> CacheResult<Option<CacheResponse>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).map(|entry| {
            let body = match self.read_piece_size {
                Some(piece_size) => ResponseBody::pieces(entry.body.clone(), piece_size),
                None => ResponseBody::Full(entry.body.clone()),
            };
            CacheResponse::new(entry.head.clone(), body)
        }))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self.entries.write().await.remove(key).is_some())
    }
}

/// Caches held in memory, shared by every clone of the storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStorage {
    caches: Arc<DashMap<String, Arc<MemoryCache>>>,
    read_piece_size: Option<usize>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hands bodies back as a stream of `piece_size`-byte pieces instead of one buffer.
    pub fn with_read_piece_size(mut self, piece_size: usize) -> Self {
        self.read_piece_size = Some(piece_size.max(1));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    pub fn cache(&self, name: &str) -> Arc<MemoryCache> {
        self.caches
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCache::new(self.read_piece_size)))
            .clone()
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn BlobCache>> {
        let cache: Arc<dyn BlobCache> = self.cache(name);
        Ok(cache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::OCTET_STREAM;
    use futures::StreamExt;

    fn response(data: &'static [u8]) -> CacheResponse {
        CacheResponse::octet_stream(ResponseBody::once(Bytes::from_static(data)), data.len())
    }

    #[tokio::test]
    async fn test_put_match_delete() {
        let storage = MemoryCacheStorage::new();
        let cache = storage.open("session").await.unwrap();

        cache.put("/index/0", response(b"abcd")).await.unwrap();
        let found = cache.match_key("/index/0").await.unwrap().unwrap();
        assert_eq!(found.header("content-type"), Some(OCTET_STREAM));
        assert_eq!(found.into_body().collect().await.unwrap(), Bytes::from_static(b"abcd"));

        assert!(cache.match_key("/index/1").await.unwrap().is_none());
        assert_eq!(cache.keys().await.unwrap(), vec!["/index/0".to_string()]);

        assert!(cache.delete("/index/0").await.unwrap());
        assert!(!cache.delete("/index/0").await.unwrap());
        assert!(cache.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_shares_entries_by_name() {
        let storage = MemoryCacheStorage::new();
        storage.open("a").await.unwrap().put("k", response(b"1")).await.unwrap();

        let again = storage.clone().open("a").await.unwrap();
        assert_eq!(again.keys().await.unwrap(), vec!["k".to_string()]);

        let other = storage.open("b").await.unwrap();
        assert!(other.keys().await.unwrap().is_empty());
        assert!(storage.contains("a") && storage.contains("b"));
    }

    #[tokio::test]
    async fn test_read_piece_size_streams_body() {
        let storage = MemoryCacheStorage::new().with_read_piece_size(2);
        let cache = storage.open("pieces").await.unwrap();
        cache.put("k", response(b"abcde")).await.unwrap();

        let body = cache.match_key("k").await.unwrap().unwrap().into_body();
        let pieces: Vec<Bytes> = body.into_stream().map(|piece| piece.unwrap()).collect().await;
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[2], Bytes::from_static(b"e"));
    }
}
