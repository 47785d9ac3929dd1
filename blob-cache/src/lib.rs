//! Named key/response caches.
//!
//! A [`CacheStorage`] opens caches by name; each [`BlobCache`] maps string keys
//! to response-shaped values whose bodies may be handed back as a stream.

pub mod error;
pub mod local;
pub mod memory;
pub mod response;
pub mod store;

pub use error::{CacheError, CacheResult};
pub use local::{LocalCache, LocalCacheStorage};
pub use memory::{MemoryCache, MemoryCacheStorage};
pub use response::{BodyStream, CacheResponse, ResponseBody, ResponseHead, OCTET_STREAM};
pub use store::{BlobCache, CacheStorage};
