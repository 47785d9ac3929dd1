use std::sync::{Arc, Mutex, PoisonError};

use blob_cache::CacheStorage;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::platform::ScalarStore;

/// Scalar key remembering the cache name of the last active store.
pub const LAST_CACHE_NAME_KEY: &str = "last-cache-name";

/// Tracks which cache name is the live generation.
///
/// At most one generation is meaningful at a time. When a store opens under a
/// name different from the recorded one, the previous generation's cache is
/// emptied in the background and the new name is recorded.
#[derive(Debug)]
pub struct GenerationRegistry {
    scalars: Arc<dyn ScalarStore>,
    lock: Mutex<()>,
}

impl GenerationRegistry {
    pub fn new(scalars: Arc<dyn ScalarStore>) -> Self {
        Self { scalars, lock: Mutex::new(()) }
    }

    pub fn current(&self) -> Result<Option<String>> {
        Ok(self.scalars.get(LAST_CACHE_NAME_KEY)?)
    }

    /// Records `name` as the live generation, scheduling eviction of the previous one.
    ///
    /// Must be called from within a tokio runtime when a different generation
    /// is recorded, since the eviction is spawned.
    pub fn advance(&self, name: &str, caches: &Arc<dyn CacheStorage>) -> Result<Option<PendingEviction>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let previous = self.scalars.get(LAST_CACHE_NAME_KEY)?;
        let eviction = match previous {
            Some(previous) if !previous.is_empty() && previous != name => {
                tracing::info!("cache generation {} superseded by {}, evicting", previous, name);
                Some(PendingEviction::spawn(caches.clone(), previous))
            }
            _ => None,
        };

        self.scalars.set(LAST_CACHE_NAME_KEY, name)?;
        Ok(eviction)
    }
}

/// Deletes every key of the cache named `name`, returning how many were removed.
pub async fn evict_generation(caches: &dyn CacheStorage, name: &str) -> Result<usize> {
    let cache = caches.open(name).await?;
    let keys = cache.keys().await?;
    let mut evicted = 0;
    for key in &keys {
        if cache.delete(key).await? {
            evicted += 1;
        }
    }
    Ok(evicted)
}

/// A background eviction of a superseded generation.
#[derive(Debug)]
pub struct PendingEviction {
    previous: String,
    handle: JoinHandle<Result<usize>>,
}

impl PendingEviction {
    fn spawn(caches: Arc<dyn CacheStorage>, previous: String) -> Self {
        let name = previous.clone();
        let handle = tokio::spawn(async move {
            let result = evict_generation(caches.as_ref(), &name).await;
            match &result {
                Ok(evicted) => tracing::debug!("evicted {} entries from cache {}", evicted, name),
                Err(e) => tracing::warn!("failed to evict cache {}: {}", name, e),
            }
            result
        });
        Self { previous, handle }
    }

    /// Name of the generation being evicted.
    pub fn previous(&self) -> &str {
        &self.previous
    }

    /// Waits for the eviction, returning the number of keys deleted.
    pub async fn wait(self) -> Result<usize> {
        self.handle.await?
    }
}
