use bytes::Bytes;
use cache_chunk_store::{CacheChunkStore, ChunkStore, ChunkStoreOptions, Platform, ReadRange};
use criterion::{criterion_group, criterion_main, Criterion};
use tokio::runtime::Runtime;

const CHUNK_LENGTH: usize = 16 * 1024;

fn put_get_benchmark(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = CacheChunkStore::new(CHUNK_LENGTH, ChunkStoreOptions::default(), &Platform::in_memory()).unwrap();
    let chunk = Bytes::from(vec![7u8; CHUNK_LENGTH]);

    c.bench_function("put 16KiB chunk", |b| {
        b.to_async(&rt).iter(|| store.put(0, chunk.clone()))
    });

    rt.block_on(store.put(1, chunk.clone())).unwrap();
    c.bench_function("get 16KiB chunk", |b| b.to_async(&rt).iter(|| store.get(1, None)));
    c.bench_function("get 1KiB range", |b| {
        b.to_async(&rt).iter(|| store.get(1, Some(ReadRange::new(4096, 1024))))
    });
}

criterion_group!(benches, put_get_benchmark);
criterion_main!(benches);
