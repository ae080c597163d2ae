use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use lz4_window::framed::{CompressionSettings, DecompressionSettings, FrameDecoder};
use lz4_window::raw;
use lz4_window::xxhash::xxh32;
use lz4_window::Dictionary;
use rand::prelude::*;

fn criterion_benchmark(c: &mut Criterion) {
    let mut data = vec![0u8; 10_000_000];
    StdRng::seed_from_u64(7).fill(&mut data[2_000_000..6_000_000]); // mixed
    for (i, byte) in data[6_000_000..].iter_mut().enumerate() {
        *byte = b"the quick brown fox jumps over the lazy dog "[i % 44];
    }

    let uncompressed_data: &[u8] = data.as_slice();
    let compressed_data = CompressionSettings::default().compress_to_vec(uncompressed_data).unwrap();

    let mut group = c.benchmark_group("frame");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_function("compress", |b| b.iter(|| CompressionSettings::default().compress_to_vec(black_box(uncompressed_data))));
    group.bench_function("decompress", |b| b.iter(|| DecompressionSettings::default().decompress(black_box(&compressed_data))));
    group.bench_function("decompress streaming", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new(&DecompressionSettings::default());
            let mut len = 0;
            for chunk in compressed_data.chunks(64 * 1024) {
                len += decoder.update(chunk).unwrap().len();
            }
            len
        })
    });
    group.finish();

    let block = &data[6_000_000..6_065_536];
    let mut table = raw::HashTable::new();
    let mut output = vec![0; raw::max_compressed_block_size(block.len())];
    c.bench_function("raw compress 64k", |b| {
        b.iter(|| {
            table.clear();
            raw::compress_block(black_box(block), 0, block.len(), &mut table, &mut output, 0)
        })
    });

    let dictionary = Dictionary::new(&data[6_000_000..6_065_536]);
    let small = &data[6_100_000..6_101_000];
    let mut settings = CompressionSettings::default();
    settings.dictionary(&dictionary);
    c.bench_function("compress 1k with dictionary", |b| b.iter(|| settings.compress_to_vec(black_box(small))));

    c.bench_function("xxh32 10M", |b| b.iter(|| xxh32(black_box(uncompressed_data), 0)));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
