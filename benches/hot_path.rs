//! HOT PATH PERFORMANCE BENCHMARKS
//!
//! Per-sample costs: tag parsing, tag-set union, context keys and the
//! sample path through a shard.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tessera_lib::aggregator::{ShardedAggregator, TimeSampler};
use tessera_lib::ckey::ContextKeyGenerator;
use tessera_lib::core::{ConfigBuilder, StringInterner};
use tessera_lib::metrics::{MetricSample, MetricType, Serie};
use tessera_lib::tagset::{CachingFactory, Tags};
use tessera_lib::telemetry::Registry;

fn raw_tags(n: usize) -> Vec<u8> {
    (0..n)
        .map(|i| format!("key{}:value{}", i, i))
        .collect::<Vec<_>>()
        .join(",")
        .into_bytes()
}

/// Parsing a raw tag list, cached and uncached
fn bench_parse_tags(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_tags");
    let registry = Registry::new();

    for n in [1, 5, 20] {
        let raw = raw_tags(n);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_with_input(BenchmarkId::new("cached", n), &raw, |b, raw| {
            let mut factory = CachingFactory::new(10_000, 3);
            let mut interner = StringInterner::new(4096, &registry);
            b.iter(|| black_box(factory.parse_tags(black_box(raw), &mut interner).unwrap()));
        });

        group.bench_with_input(BenchmarkId::new("uncached", n), &n, |b, n| {
            let mut factory = CachingFactory::new(10_000, 3);
            let mut interner = StringInterner::new(4096, &registry);
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                let raw = format!("{},unique:{}", String::from_utf8_lossy(&raw_tags(*n)), i);
                black_box(factory.parse_tags(raw.as_bytes(), &mut interner).unwrap())
            });
        });
    }

    group.finish();
}

/// Union of two tag sets, answered from the union cache
fn bench_union(c: &mut Criterion) {
    let mut group = c.benchmark_group("union");
    let mut factory = CachingFactory::new(10_000, 3);
    let a = factory.new_tags(&["env:prod", "service:web", "version:1.2.3"]);
    let b = factory.new_tags(&["host:web-01", "az:eu-west-1a"]);

    group.bench_function("cached_pair", |bench| {
        bench.iter(|| black_box(factory.union(black_box(&a), black_box(&b))));
    });

    group.finish();
}

/// Context key generation
fn bench_context_key(c: &mut Criterion) {
    let generator = ContextKeyGenerator::new();
    let tags = Tags::new(["env:prod", "service:web", "version:1.2.3"]);

    c.bench_function("context_key", |b| {
        b.iter(|| black_box(generator.generate(black_box("requests.count"), "web-01", &tags)));
    });
}

fn samples(contexts: usize, mtype: MetricType) -> Vec<MetricSample> {
    (0..contexts)
        .map(|i| {
            MetricSample::new(format!("metric.{}", i), 1.0, mtype)
                .with_tags(Tags::new([format!("id:{}", i % 16), "env:bench".to_string()]))
                .with_host("bench-host")
                .at(1001.0)
        })
        .collect()
}

/// Sample path through a single shard
/// TARGET: <200ns per sample for known contexts
fn bench_sample_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_path");
    let config = ConfigBuilder::new().build().unwrap();

    for mtype in [MetricType::Gauge, MetricType::Counter, MetricType::Histogram] {
        let batch = samples(1000, mtype);
        group.throughput(Throughput::Elements(batch.len() as u64));
        group.bench_with_input(BenchmarkId::new("time_sampler", mtype), &batch, |b, batch| {
            let mut sampler = TimeSampler::new(0, &config.aggregator, &Registry::new());
            b.iter(|| {
                for s in batch {
                    sampler.sample(black_box(s)).unwrap();
                }
            });
        });
    }

    let batch = samples(1000, MetricType::Count);
    let sharded = ConfigBuilder::new().shards(4).build().unwrap();
    let aggregator = ShardedAggregator::new(&sharded.aggregator, &Registry::new()).unwrap();
    group.bench_function("sharded_4", |b| {
        b.iter(|| {
            for s in &batch {
                aggregator.sample(black_box(s)).unwrap();
            }
        });
    });

    group.finish();
}

/// Sampling then flushing a full bucket
fn bench_flush(c: &mut Criterion) {
    let config = ConfigBuilder::new().build().unwrap();
    let batch = samples(10_000, MetricType::Count);

    c.bench_function("flush_10k_contexts", |b| {
        let mut sampler = TimeSampler::new(0, &config.aggregator, &Registry::new());
        let mut out: Vec<Serie> = Vec::with_capacity(batch.len());
        b.iter(|| {
            for s in &batch {
                sampler.sample(s).unwrap();
            }
            out.clear();
            black_box(sampler.flush(1010.0, &mut out));
        });
    });
}

criterion_group! {
    name = hot_paths;
    config = Criterion::default()
        .significance_level(0.01)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2));
    targets = bench_parse_tags,
              bench_union,
              bench_context_key,
              bench_sample_path,
              bench_flush
}

criterion_main!(hot_paths);
