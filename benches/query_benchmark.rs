//! Benchmarks for k2geo lookup performance.
//!
//! Run with: cargo bench
//!
//! This benchmark suite measures:
//! - On-disk vs materialized index lookups
//! - Cache hit vs miss performance
//! - Scalability with database size
//! - Load and hot reload cost

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use k2geo::binary::DatabaseWriter;
use k2geo::{CacheConfig, Database, GeoReader, IndexStrategy, ReaderConfig};
use std::net::Ipv4Addr;

const PROVINCES: &[&str] = &["北京市", "上海市", "广东省", "福建省", "浙江省", "四川省"];
const ISPS: &[&str] = &["电信", "联通", "移动", "CZ88.NET"];

/// Generate a database of `count` ranges with every other /24 left as a gap.
fn generate_db(count: u32) -> Vec<u8> {
    let mut writer = DatabaseWriter::new();
    for i in 0..count {
        let begin = i * 512;
        let region = format!(
            "{} {}",
            PROVINCES[(i as usize) % PROVINCES.len()],
            ISPS[(i as usize / PROVINCES.len()) % ISPS.len()]
        );
        writer.add_range(begin, begin + 255, "中国", &region).unwrap();
    }
    writer.build().unwrap()
}

/// Generate queries - a mix of hits and gap misses.
fn generate_queries(count: usize, ranges: u32) -> Vec<String> {
    (0..count as u32)
        .map(|i| {
            let ip = (i.wrapping_mul(2_654_435_761) % ranges) * 512 + (i % 2) * 300;
            Ipv4Addr::from(ip).to_string()
        })
        .collect()
}

fn reader_with(data: Vec<u8>, strategy: IndexStrategy, cache: CacheConfig) -> GeoReader {
    let config = ReaderConfig::default()
        .with_strategy(strategy)
        .with_cache(cache);
    let reader = GeoReader::with_config(config);
    reader.load_bytes(data).unwrap();
    reader
}

/// Benchmark lookups without cache for both index strategies.
fn bench_strategies(c: &mut Criterion) {
    let data = generate_db(100_000);
    let queries = generate_queries(1000, 100_000);

    let mut group = c.benchmark_group("strategy_no_cache");
    group.throughput(Throughput::Elements(queries.len() as u64));

    for strategy in [IndexStrategy::OnDisk, IndexStrategy::Materialized] {
        let reader = reader_with(data.clone(), strategy, CacheConfig::no_cache());
        group.bench_function(strategy.name(), |b| {
            b.iter(|| {
                for query in &queries {
                    black_box(reader.lookup(query).unwrap());
                }
            })
        });
    }

    group.finish();
}

/// Benchmark cache miss vs hit performance.
fn bench_cache_performance(c: &mut Criterion) {
    let reader = reader_with(
        generate_db(100_000),
        IndexStrategy::OnDisk,
        CacheConfig::with_capacity(10_000),
    );

    let mut group = c.benchmark_group("cache_performance");

    // Single query - cache miss
    group.bench_function("single_query_miss", |b| {
        b.iter_batched(
            || {
                reader.clear_cache();
                "1.2.3.4"
            },
            |query| black_box(reader.lookup(query).unwrap()),
            criterion::BatchSize::SmallInput,
        )
    });

    // Single query - cache hit (pre-warm)
    let _ = reader.lookup("1.2.3.4");
    group.bench_function("single_query_hit", |b| {
        b.iter(|| black_box(reader.lookup("1.2.3.4").unwrap()))
    });

    group.finish();
}

/// Benchmark scalability with different database sizes.
fn bench_scalability(c: &mut Criterion) {
    let mut group = c.benchmark_group("scalability");

    for size in [1_000u32, 10_000, 100_000, 500_000].iter() {
        let db = Database::from_bytes(generate_db(*size), IndexStrategy::OnDisk).unwrap();
        let ips: Vec<u32> = (0..100u32).map(|i| (i * 7919 % size) * 512).collect();

        group.throughput(Throughput::Elements(ips.len() as u64));
        group.bench_with_input(BenchmarkId::new("ranges", size), size, |b, _| {
            b.iter(|| {
                for ip in &ips {
                    black_box(db.lookup_u32(*ip));
                }
            })
        });
    }

    group.finish();
}

/// Benchmark load cost of each strategy.
fn bench_load(c: &mut Criterion) {
    let data = generate_db(100_000);
    let mut group = c.benchmark_group("load_100k_ranges");

    for strategy in [IndexStrategy::OnDisk, IndexStrategy::Materialized] {
        group.bench_function(strategy.name(), |b| {
            b.iter_batched(
                || data.clone(),
                |data| black_box(Database::from_bytes(data, strategy).unwrap()),
                criterion::BatchSize::LargeInput,
            )
        });
    }

    group.finish();
}

/// Benchmark hot reload performance.
fn bench_hot_reload(c: &mut Criterion) {
    let data = generate_db(100_000);
    let reader = reader_with(
        data.clone(),
        IndexStrategy::Materialized,
        CacheConfig::default(),
    );

    let mut group = c.benchmark_group("hot_reload");

    group.bench_function("reload_100k_ranges", |b| {
        b.iter_batched(
            || data.clone(),
            |data| reader.load_bytes(data).unwrap(),
            criterion::BatchSize::LargeInput,
        )
    });

    group.finish();
}

/// Benchmark database build and image size.
fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for size in [1_000u32, 10_000].iter() {
        let data_len = generate_db(*size).len();
        group.bench_with_input(BenchmarkId::new("ranges", size), size, |b, &size| {
            b.iter(|| black_box(generate_db(size)))
        });

        // Report file size
        println!(
            "Database with {} ranges: {} bytes ({:.2} KB)",
            size,
            data_len,
            data_len as f64 / 1024.0
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_strategies,
    bench_cache_performance,
    bench_scalability,
    bench_load,
    bench_hot_reload,
    bench_build,
);

criterion_main!(benches);
