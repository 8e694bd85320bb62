use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use altcache::cache::key::{FileKeyEncoder, KeyEncoder, NamespacedKeyEncoder, TableKeyEncoder};

/// Benchmark the encoders on a typical short key
fn bench_short_keys(c: &mut Criterion) {
    let file = FileKeyEncoder::new(1);
    let table = TableKeyEncoder::default();
    let namespaced = NamespacedKeyEncoder::new("altcache_");

    let mut group = c.benchmark_group("key_encoding_short");

    group.bench_function("file", |b| {
        b.iter(|| file.encode(black_box("pods_view_post_123"), black_box("pods_view")))
    });
    group.bench_function("table", |b| {
        b.iter(|| table.encode(black_box("pods_view_post_123"), black_box("pods_view")))
    });
    group.bench_function("namespaced", |b| {
        b.iter(|| namespaced.encode(black_box("pods_view_post_123"), black_box("pods_view")))
    });

    group.finish();
}

/// Benchmark table key limiting as keys grow past the column width
fn bench_table_key_lengths(c: &mut Criterion) {
    let table = TableKeyEncoder::default();
    let mut group = c.benchmark_group("key_encoding_table_lengths");

    for len in [64usize, 255, 1024, 8192] {
        let key = "k".repeat(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &key, |b, key| {
            b.iter(|| table.encode(black_box(key), black_box("group")))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_short_keys, bench_table_key_lengths);
criterion_main!(benches);
