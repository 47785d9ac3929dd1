#![allow(clippy::uninlined_format_args)]
#![deny(unused_qualifications)]

//! Fixed-size chunk storage persisted into named blob caches.
//!
//! A [`CacheChunkStore`] splits one logical file into chunks of `chunk_length`
//! bytes and stores chunk `i` under the key `/index/i` of a named cache.
//! Opening a store under a new name schedules eviction of the cache left
//! behind by the previously active name.

pub mod config;
pub mod error;
pub mod generation;
pub mod geometry;
pub mod platform;
pub mod store;

pub use config::{CacheBackend, ChunkStoreOptions, MarkerBackend, PlatformConfig, StoreConfig, DEFAULT_CACHE_NAME};
pub use error::{ChunkStoreError, Result};
pub use generation::{GenerationRegistry, PendingEviction, LAST_CACHE_NAME_KEY};
pub use geometry::ChunkGeometry;
pub use platform::{FileScalarStore, MemoryScalarStore, Platform, ScalarStore};
pub use store::{chunk_key, CacheChunkStore, ChunkStore, ReadRange};
