use bytes::Bytes;
use cache_chunk_store::{CacheChunkStore, ChunkStore, ChunkStoreOptions, Platform, ReadRange, StoreConfig};
use tempfile::tempdir;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn chunk(fill: u8, len: usize) -> Bytes {
    Bytes::from(vec![fill; len])
}

#[tokio::test]
async fn test_chunks_survive_a_new_store_with_the_same_name() {
    init_tracing();
    let temp_dir = tempdir().unwrap();

    {
        let platform = Platform::local(temp_dir.path());
        let store = CacheChunkStore::new(16, ChunkStoreOptions::default().with_length(40).with_name("movie"), &platform).unwrap();
        store.put(0, chunk(b'a', 16)).await.unwrap();
        store.put(1, chunk(b'b', 16)).await.unwrap();
        store.put(2, chunk(b'c', 8)).await.unwrap();
        store.close().await.unwrap();
    }

    let platform = Platform::local(temp_dir.path());
    let store = CacheChunkStore::new(16, ChunkStoreOptions::default().with_length(40).with_name("movie"), &platform).unwrap();
    assert_eq!(store.get(1, None).await.unwrap(), chunk(b'b', 16));
    assert_eq!(store.get(2, None).await.unwrap(), chunk(b'c', 8));
    assert_eq!(store.get(0, Some(ReadRange::new(4, 4))).await.unwrap(), chunk(b'a', 4));
    assert!(store.take_pending_eviction().is_none());
}

#[tokio::test]
async fn test_switching_names_reclaims_the_previous_session() {
    init_tracing();
    let temp_dir = tempdir().unwrap();

    {
        let platform = Platform::local(temp_dir.path());
        let store = CacheChunkStore::new(4, ChunkStoreOptions::default().with_name("session-1"), &platform).unwrap();
        for index in 0..5 {
            store.put(index, chunk(index as u8, 4)).await.unwrap();
        }
    }

    // A later process with a new session id picks up the marker from disk.
    let platform = Platform::local(temp_dir.path());
    let store = CacheChunkStore::new(4, ChunkStoreOptions::default().with_name("session-2"), &platform).unwrap();
    store.put(0, chunk(9, 4)).await.unwrap();

    let eviction = store.take_pending_eviction().expect("previous session scheduled for eviction");
    assert_eq!(eviction.previous(), "session-1");
    assert_eq!(eviction.wait().await.unwrap(), 5);

    let stale = platform.caches().unwrap().open("session-1").await.unwrap();
    assert!(stale.keys().await.unwrap().is_empty());
    assert_eq!(store.get(0, None).await.unwrap(), chunk(9, 4));
}

#[tokio::test]
async fn test_destroy_on_local_platform() {
    init_tracing();
    let temp_dir = tempdir().unwrap();
    let config = StoreConfig::from_json(&format!(
        r#"{{
            "chunk_length": 4,
            "length": 8,
            "platform": {{
                "backend": {{ "type": "local", "directory": {:?} }},
                "marker": {{ "type": "file", "path": {:?} }}
            }}
        }}"#,
        temp_dir.path().join("caches"),
        temp_dir.path().join("scalars.json"),
    ))
    .unwrap();

    let store = CacheChunkStore::from_config(&config).unwrap();
    store.put(0, chunk(1, 4)).await.unwrap();
    store.put(1, chunk(2, 4)).await.unwrap();
    store.destroy().await.unwrap();

    let reopened = CacheChunkStore::from_config(&config).unwrap();
    assert!(reopened.get(0, None).await.unwrap_err().is_not_found());
    assert!(reopened.get(1, None).await.unwrap_err().is_not_found());
}
