use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::CacheResult;
use crate::response::{BodyStream, CacheResponse, ResponseBody, ResponseHead};
use crate::store::{BlobCache, CacheStorage};

const HEAD_SUFFIX: &str = ".head.json";
const BODY_SUFFIX: &str = ".body";
const DEFAULT_READ_PIECE_SIZE: usize = 64 * 1024;
/// Longest hex-encoded name used verbatim as a file name; longer ones are hashed.
const MAX_ENCODED_NAME: usize = 128;

/// Head file contents. The key is kept here because hashed file names do not decode.
#[derive(Serialize, Deserialize, Debug)]
struct StoredHead {
    key: String,
    head: ResponseHead,
}

/// A cache that keeps one directory per cache name under `base_path`.
///
/// Every key becomes a pair of files named after the encoded key: the
/// response head as JSON and the raw body. Bodies are read back as a stream.
#[derive(Debug, Clone)]
pub struct LocalCacheStorage {
    base_path: PathBuf,
    read_piece_size: usize,
}

impl LocalCacheStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self { base_path: base_path.into(), read_piece_size: DEFAULT_READ_PIECE_SIZE }
    }

    pub fn with_read_piece_size(mut self, piece_size: usize) -> Self {
        self.read_piece_size = piece_size.max(1);
        self
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn cache_dir(&self, name: &str) -> PathBuf {
        self.base_path.join(encode_file_name(name))
    }
}

#[async_trait]
impl CacheStorage for LocalCacheStorage {
    async fn open(&self, name: &str) -> CacheResult<Arc<dyn BlobCache>> {
        let directory = self.cache_dir(name);
        fs::create_dir_all(&directory).await?;
        let cache: Arc<dyn BlobCache> = Arc::new(LocalCache {
            directory,
            read_piece_size: self.read_piece_size,
        });
        Ok(cache)
    }
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    directory: PathBuf,
    read_piece_size: usize,
}

impl LocalCache {
    fn entry_path(&self, key: &str, suffix: &str) -> PathBuf {
        self.directory.join(format!("{}{}", encode_file_name(key), suffix))
    }
}

#[async_trait]
impl BlobCache for LocalCache {
    async fn put(&self, key: &str, response: CacheResponse) -> CacheResult<()> {
        let (head, body) = response.into_parts();
        let body = body.collect().await?;

        // Body first so a visible head always has a complete body behind it.
        write_atomically(&self.entry_path(key, BODY_SUFFIX), &body).await?;
        let head = serde_json::to_vec(&StoredHead { key: key.to_string(), head })?;
        write_atomically(&self.entry_path(key, HEAD_SUFFIX), &head).await?;

        tracing::debug!("stored {} ({} bytes) in {}", key, body.len(), self.directory.display());
        Ok(())
    }

    async fn match_key(&self, key: &str) -> CacheResult<Option<CacheResponse>> {
        let head = match fs::read(self.entry_path(key, HEAD_SUFFIX)).await {
            Ok(head) => head,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredHead = serde_json::from_slice(&head)?;
        if stored.key != key {
            return Ok(None);
        }

        let file = match fs::File::open(self.entry_path(key, BODY_SUFFIX)).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let body = ResponseBody::Stream(file_stream(file, self.read_piece_size));
        Ok(Some(CacheResponse::new(stored.head, body)))
    }

    async fn keys(&self) -> CacheResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut entries = match fs::read_dir(&self.directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            if !file_name.to_str().is_some_and(|name| name.ends_with(HEAD_SUFFIX)) {
                continue;
            }
            let stored: StoredHead = serde_json::from_slice(&fs::read(entry.path()).await?)?;
            keys.push(stored.key);
        }

        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let existed = remove_if_exists(&self.entry_path(key, HEAD_SUFFIX)).await?;
        remove_if_exists(&self.entry_path(key, BODY_SUFFIX)).await?;
        Ok(existed)
    }
}

/// Hex-encodes `raw`, or hashes it when the encoding would make an overlong file name.
fn encode_file_name(raw: &str) -> String {
    let encoded = hex::encode(raw);
    if encoded.len() <= MAX_ENCODED_NAME {
        return encoded;
    }
    format!("h-{}", hex::encode(Sha256::digest(raw.as_bytes())))
}

/// Streams the file in pieces of at most `piece_size` bytes.
fn file_stream(file: fs::File, piece_size: usize) -> BodyStream {
    stream::try_unfold(file, move |file| read_piece(file, piece_size)).boxed()
}

async fn read_piece(mut file: fs::File, piece_size: usize) -> std::io::Result<Option<(Bytes, fs::File)>> {
    let mut buf = vec![0u8; piece_size];
    let read = file.read(&mut buf).await?;
    if read == 0 {
        return Ok(None);
    }
    buf.truncate(read);
    Ok(Some((Bytes::from(buf), file)))
}

async fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, data).await?;
    fs::rename(&temp_path, path).await
}

async fn remove_if_exists(path: &Path) -> std::io::Result<bool> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
