use std::io::{self, ErrorKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use blob_cache::{BlobCache, CacheResponse, CacheStorage, ResponseBody};
use bytes::{Bytes, BytesMut};
use futures::future::{self, BoxFuture, FutureExt};
use futures::StreamExt;
use tokio::sync::OnceCell;

use crate::config::{ChunkStoreOptions, StoreConfig};
use crate::error::{ChunkStoreError, Result};
use crate::generation::{GenerationRegistry, PendingEviction};
use crate::geometry::ChunkGeometry;
use crate::platform::Platform;

/// Trait for storing and fetching fixed-size chunks by index.
///
/// The closed state is checked when a method is called, not when its future
/// is first polled: an operation issued before `close` runs to completion.
pub trait ChunkStore: Send + Sync {
    /// Stores chunk `index`. Its length must match the store's chunk geometry.
    fn put(&self, index: u64, data: Bytes) -> BoxFuture<'_, Result<()>>;

    /// Retrieves chunk `index`, or the part of it selected by `range`.
    fn get(&self, index: u64, range: Option<ReadRange>) -> BoxFuture<'_, Result<Bytes>>;

    /// Stops accepting operations.
    fn close(&self) -> BoxFuture<'_, Result<()>>;

    /// Stops accepting operations and erases every stored chunk.
    fn destroy(&self) -> BoxFuture<'_, Result<()>>;
}

/// A sub-range of a chunk. Offset defaults to 0, length to the rest of the chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadRange {
    pub offset: Option<usize>,
    pub length: Option<usize>,
}

impl ReadRange {
    pub fn new(offset: usize, length: usize) -> Self {
        Self { offset: Some(offset), length: Some(length) }
    }

    pub fn from_offset(offset: usize) -> Self {
        Self { offset: Some(offset), length: None }
    }

    /// Selects this range out of `chunk`, clamped to its bounds.
    pub fn slice(&self, chunk: &Bytes) -> Bytes {
        let start = self.offset.unwrap_or(0).min(chunk.len());
        let end = match self.length {
            Some(length) => start.saturating_add(length).min(chunk.len()),
            None => chunk.len(),
        };
        chunk.slice(start..end)
    }
}

/// Cache key of chunk `index`.
pub fn chunk_key(index: u64) -> String {
    format!("/index/{}", index)
}

/// A [`ChunkStore`] persisting each chunk as a response in a named blob cache.
#[derive(Debug)]
pub struct CacheChunkStore {
    geometry: ChunkGeometry,
    name: String,
    closed: AtomicBool,
    caches: Arc<dyn CacheStorage>,
    generations: Arc<GenerationRegistry>,
    cache: OnceCell<Arc<dyn BlobCache>>,
    pending_eviction: Mutex<Option<PendingEviction>>,
}

impl CacheChunkStore {
    pub fn new(chunk_length: usize, options: ChunkStoreOptions, platform: &Platform) -> Result<Self> {
        let caches = platform.caches().cloned().ok_or(ChunkStoreError::UnsupportedPlatform)?;
        let geometry = ChunkGeometry::new(chunk_length, options.length)?;

        Ok(Self {
            geometry,
            name: options.resolved_name(),
            closed: AtomicBool::new(false),
            caches,
            generations: platform.generations().clone(),
            cache: OnceCell::new(),
            pending_eviction: Mutex::new(None),
        })
    }

    /// Builds the configured platform and opens a store on it.
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        let chunk_length = usize::try_from(config.chunk_length)
            .map_err(|_| ChunkStoreError::Config(format!("chunk length {} does not fit in memory", config.chunk_length)))?;
        let platform = config.platform.build();
        Self::new(chunk_length, config.options.clone(), &platform)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &ChunkGeometry {
        &self.geometry
    }

    pub fn chunk_length(&self) -> usize {
        self.geometry.chunk_length()
    }

    pub fn total_length(&self) -> Option<u64> {
        self.geometry.total_length()
    }

    pub fn last_chunk_index(&self) -> Option<u64> {
        self.geometry.last_chunk_index()
    }

    pub fn last_chunk_length(&self) -> Option<usize> {
        self.geometry.last_chunk_length()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Opens this store's cache, once.
    ///
    /// The first call records this store's name as the live generation and
    /// schedules eviction of the previous one without waiting for it.
    pub async fn init(&self) -> Result<Arc<dyn BlobCache>> {
        let cache = self
            .cache
            .get_or_try_init(|| async {
                if let Some(eviction) = self.generations.advance(&self.name, &self.caches)? {
                    *self.pending_eviction.lock().unwrap_or_else(PoisonError::into_inner) = Some(eviction);
                }
                Ok::<_, ChunkStoreError>(self.caches.open(&self.name).await?)
            })
            .await?;
        Ok(cache.clone())
    }

    /// Takes the eviction of the superseded generation scheduled by [`init`](Self::init), if any.
    pub fn take_pending_eviction(&self) -> Option<PendingEviction> {
        self.pending_eviction.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ChunkStoreError::Closed);
        }
        Ok(())
    }

    /// Marks the store closed, failing if it already was.
    fn mark_closed(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ChunkStoreError::Closed);
        }
        Ok(())
    }
}

impl ChunkStore for CacheChunkStore {
    fn put(&self, index: u64, data: Bytes) -> BoxFuture<'_, Result<()>> {
        match self.ensure_open().and_then(|_| self.geometry.check(index, data.len())) {
            Ok(()) => self.put_chunk(index, data).boxed(),
            Err(e) => future::ready(Err(e)).boxed(),
        }
    }

    fn get(&self, index: u64, range: Option<ReadRange>) -> BoxFuture<'_, Result<Bytes>> {
        match self.ensure_open() {
            Ok(()) => self.get_chunk(index, range).boxed(),
            Err(e) => future::ready(Err(e)).boxed(),
        }
    }

    fn close(&self) -> BoxFuture<'_, Result<()>> {
        future::ready(self.mark_closed()).boxed()
    }

    fn destroy(&self) -> BoxFuture<'_, Result<()>> {
        match self.mark_closed() {
            Ok(()) => self.erase_all().boxed(),
            Err(e) => future::ready(Err(e)).boxed(),
        }
    }
}

impl CacheChunkStore {
    async fn put_chunk(&self, index: u64, data: Bytes) -> Result<()> {
        let length = data.len();
        let response = CacheResponse::octet_stream(ResponseBody::Full(data), length);
        let cache = self.init().await?;
        cache.put(&chunk_key(index), response).await?;

        tracing::debug!("put chunk {} ({} bytes) into {}", index, length, self.name);
        Ok(())
    }

    async fn get_chunk(&self, index: u64, range: Option<ReadRange>) -> Result<Bytes> {
        let cache = self.init().await?;
        let response = cache
            .match_key(&chunk_key(index))
            .await?
            .ok_or(ChunkStoreError::NotFound(index))?;

        let chunk = drain_body(response.into_body(), self.geometry.expected_length(index)).await?;
        tracing::debug!("got chunk {} ({} bytes) from {}", index, chunk.len(), self.name);

        Ok(match range {
            Some(range) => range.slice(&chunk),
            None => chunk,
        })
    }

    async fn erase_all(&self) -> Result<()> {
        let cache = self.init().await?;
        let keys = cache.keys().await?;
        for key in &keys {
            cache.delete(key).await?;
        }

        tracing::info!("destroyed chunk store {} ({} entries erased)", self.name, keys.len());
        Ok(())
    }
}

/// Reads `body` to exhaustion into a buffer sized for `expected_length` bytes.
///
/// Each piece lands at the running offset. A body longer than expected is
/// rejected; a shorter one yields only the bytes received.
async fn drain_body(body: ResponseBody, expected_length: usize) -> io::Result<Bytes> {
    let mut buf = BytesMut::zeroed(expected_length);
    let mut offset = 0;

    let mut pieces = body.into_stream();
    while let Some(piece) = pieces.next().await {
        let piece = piece?;
        let end = offset + piece.len();
        if end > buf.len() {
            return Err(io::Error::new(
                ErrorKind::InvalidData,
                format!("chunk body exceeds expected length {}", expected_length),
            ));
        }
        buf[offset..end].copy_from_slice(&piece);
        offset = end;
    }

    buf.truncate(offset);
    Ok(buf.freeze())
}
