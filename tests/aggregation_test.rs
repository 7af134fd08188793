//! End-to-end aggregation tests: samples in, series out.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tessera_lib::aggregator::{ShardedAggregator, TimeSampler};
use tessera_lib::core::TesseraError;
use tessera_lib::metrics::{
    ContextMetrics, HistogramSettings, Metric, MetricFactory, MetricSample, MetricType, Serie,
};
use tessera_lib::telemetry::Registry;

#[test]
fn test_counter_volume() {
    let (mut sampler, registry) = test_sampler();
    let names: Vec<String> = (0..50).map(|i| format!("requests.{}", i)).collect();
    let samples: Vec<MetricSample> = names
        .iter()
        .map(|n| TestSampleBuilder::new(n).mtype(MetricType::Counter).at(1001.0).build())
        .collect();

    for i in 0..500_000 {
        sampler.sample(&samples[i % samples.len()]).unwrap();
    }

    let mut out: Vec<Serie> = Vec::new();
    let report = sampler.flush(1010.0, &mut out);

    assert_eq!(report.series, 50);
    assert_eq!(out.len(), 50);
    // 10,000 samples per context over a 10s bucket
    assert!(out.iter().all(|s| s.points()[0].value == 1000.0));
    assert_eq!(sampler.pending_buckets(), 0);
    assert_eq!(registry.value("aggregator__contexts_created", &["total"]), Some(50.0));

    let mut again: Vec<Serie> = Vec::new();
    let report = sampler.flush(1010.0, &mut again);
    assert_eq!(report.series, 0);
    assert_eq!(report.errors, 0);
    assert!(again.is_empty());
}

#[test]
fn test_every_type_end_to_end() {
    let (mut sampler, _registry) = test_sampler();

    for v in [1.0, 4.0, 2.0] {
        sampler.sample(&sample!("g", v, Gauge, at 1001.0)).unwrap();
        sampler.sample(&sample!("c", v, Count, at 1001.0)).unwrap();
        sampler.sample(&sample!("h", v, Histogram, at 1001.0)).unwrap();
    }
    sampler.sample(&sample!("mc", 10.0, MonotonicCount, at 1001.0)).unwrap();
    sampler.sample(&sample!("mc", 15.0, MonotonicCount, at 1002.0)).unwrap();
    sampler.sample(&sample!("r", 10.0, Rate, at 1001.0)).unwrap();
    sampler.sample(&sample!("r", 20.0, Rate, at 1006.0)).unwrap();
    for user in ["a", "b", "a"] {
        let s = TestSampleBuilder::new("s").mtype(MetricType::Set).at(1001.0).build();
        sampler.sample(&s.with_raw_value(user)).unwrap();
    }

    let mut out: Vec<Serie> = Vec::new();
    sampler.flush(1010.0, &mut out);
    let points = points_by_name(&out);

    assert_eq!(points["g"], vec![(1000.0, 2.0)]);
    assert_eq!(points["c"], vec![(1000.0, 7.0)]);
    assert_eq!(points["mc"], vec![(1000.0, 5.0)]);
    assert_eq!(points["r"], vec![(1006.0, 2.0)]);
    assert_eq!(points["s"], vec![(1000.0, 2.0)]);
    assert_eq!(points["h.max"], vec![(1000.0, 4.0)]);
    assert_eq!(points["h.median"], vec![(1000.0, 2.0)]);
    assert_eq!(points["h.count"], vec![(1000.0, 0.3)]);
    assert_eq!(points["h.95percentile"], vec![(1000.0, 4.0)]);
    assert!(out.iter().all(|s| s.host() == "test-host"));
}

#[test]
fn test_contexts_merged_across_buckets() {
    let (mut sampler, _registry) = test_sampler();

    // three buckets, contexts present in several of them
    for (name, ts) in [("a", 1001.0), ("b", 1001.0), ("a", 1011.0), ("c", 1011.0), ("a", 1021.0), ("b", 1025.0)] {
        sampler.sample(&sample!(name, 1.0, Count, at ts)).unwrap();
    }

    let mut out: Vec<Serie> = Vec::new();
    let report = sampler.flush(1030.0, &mut out);

    assert_eq!(report.buckets, 3);
    assert_eq!(report.series, 6);
    assert_contexts_contiguous(&out);

    let points = points_by_name(&out);
    assert_eq!(points["a"], vec![(1000.0, 1.0), (1010.0, 1.0), (1020.0, 1.0)]);
    assert_eq!(points["b"], vec![(1000.0, 1.0), (1020.0, 1.0)]);
    assert_eq!(points["c"], vec![(1010.0, 1.0)]);
}

/// Accumulator that always fails to flush.
#[derive(Default)]
struct Broken;

impl Metric for Broken {
    fn add_sample(&mut self, _sample: &MetricSample, _timestamp: f64) {}

    fn flush(&mut self, _timestamp: f64) -> tessera_lib::Result<Option<Vec<Serie>>> {
        Err(TesseraError::flush("broken accumulator"))
    }

    fn is_stateful(&self) -> bool {
        false
    }
}

#[test]
fn test_failing_context_is_isolated() {
    let mut factory = MetricFactory::standard(HistogramSettings::default());
    factory.register(MetricType::Distribution, |_| Box::<Broken>::default());

    let registry = Registry::new();
    let mut sampler = TimeSampler::with_factory(0, &test_config(1).aggregator, Arc::new(factory), &registry);

    for i in 0..20 {
        sampler.sample(&sample!(&format!("ok.{}", i), 1.0, Gauge, at 1001.0)).unwrap();
    }
    sampler.sample(&sample!("broken", 1.0, Distribution, at 1001.0)).unwrap();

    let mut out: Vec<Serie> = Vec::new();
    let report = sampler.flush(1010.0, &mut out);

    assert_eq!(report.errors, 1);
    assert_eq!(report.series, 20);
    assert!(out.iter().all(|s| s.name().starts_with("ok.")));
    assert_eq!(registry.value("aggregator__flush_errors", &[]), Some(1.0));
}

#[test]
fn test_rejected_samples_leave_store_unchanged() {
    let mut store = ContextMetrics::new();
    let key = tessera_lib::ckey::ContextKey::from_raw(42);

    store.add_sample(key, &sample!("g", 3.0, Gauge), 1.0, 10, None).unwrap();
    for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        assert!(store.add_sample(key, &sample!("g", bad, Gauge), 2.0, 10, None).is_err());
    }

    let flushed = store.flush(10.0);
    assert_eq!(flushed.series.len(), 1);
    assert_eq!(flushed.series[0].points()[0].value, 3.0);
}

#[test]
fn test_sharded_matches_single_shard() {
    let single = ShardedAggregator::new(&test_config(1).aggregator, &Registry::new()).unwrap();
    let sharded = ShardedAggregator::new(&test_config(4).aggregator, &Registry::new()).unwrap();

    for i in 0..200 {
        let s = TestSampleBuilder::new(&format!("m.{}", i % 37))
            .mtype(MetricType::Count)
            .value(i as f64)
            .tag(&format!("shard_hint:{}", i % 3))
            .at(1001.0)
            .build();
        single.sample(&s).unwrap();
        sharded.sample(&s).unwrap();
    }

    let mut a: Vec<Serie> = Vec::new();
    let mut b: Vec<Serie> = Vec::new();
    single.flush(1010.0, &mut a);
    sharded.flush(1010.0, &mut b);

    let key = |s: &Serie| (s.context_key(), s.points()[0].value.to_bits());
    let mut a: Vec<_> = a.iter().map(key).collect();
    let mut b: Vec<_> = b.iter().map(key).collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[test]
fn test_tag_references_follow_context_lifetime() {
    let (mut sampler, _registry) = test_sampler();
    let shared = tessera_lib::tagset::Tags::new(["env:test"]);

    for i in 0..10 {
        sampler.sample(&sample!(&format!("m.{}", i), 1.0, Gauge, at 1001.0)).unwrap();
    }
    let mut out: Vec<Serie> = Vec::new();
    sampler.flush(1010.0, &mut out);

    // still within the expiry window
    assert_eq!(sampler.resolver().len(), 10);
    assert_eq!(sampler.resolver().tags_tlm().refs(shared.hash()), Some(10));

    let report = sampler.flush(2000.0, &mut out);
    assert_eq!(report.expired, 10);
    assert!(sampler.resolver().is_empty());
    assert!(sampler.resolver().tags_tlm().is_empty());
}

#[test]
fn test_rate_carried_across_flushes() {
    let (mut sampler, _registry) = test_sampler();
    let mut out: Vec<Serie> = Vec::new();

    sampler.sample(&sample!("r", 100.0, Rate, at 1001.0)).unwrap();
    sampler.flush(1010.0, &mut out);
    assert!(out.is_empty());

    sampler.sample(&sample!("r", 150.0, Rate, at 1011.0)).unwrap();
    sampler.flush(1020.0, &mut out);
    assert_eq!(points_by_name(&out)["r"], vec![(1011.0, 5.0)]);
}

#[test]
fn test_stateful_contexts_across_pending_buckets() {
    let (mut sampler, _registry) = test_sampler();

    for (v, ts) in [(0.0, 1001.0), (10.0, 1011.0), (30.0, 1021.0)] {
        sampler.sample(&sample!("r", v, Rate, at ts)).unwrap();
        sampler.sample(&sample!("mc", v, MonotonicCount, at ts)).unwrap();
        sampler.sample(&sample!("hr", v, Historate, at ts)).unwrap();
    }

    let mut out: Vec<Serie> = Vec::new();
    let report = sampler.flush(1030.0, &mut out);
    assert_eq!(report.buckets, 3);
    assert_eq!(report.errors, 0);
    assert_contexts_contiguous(&out);

    let points = points_by_name(&out);
    assert_eq!(points["r"], vec![(1011.0, 1.0), (1021.0, 2.0)]);
    assert_eq!(points["mc"], vec![(1010.0, 10.0), (1020.0, 20.0)]);
    assert_eq!(points["hr.max"], vec![(1010.0, 1.0), (1020.0, 2.0)]);
    assert_eq!(sampler.parked(), 3);
}

#[test]
fn test_rate_sampled_ahead_of_each_flush() {
    let (mut sampler, _registry) = test_sampler();
    let mut out: Vec<Serie> = Vec::new();

    for i in 0..5 {
        let ts = 1000.0 + 10.0 * i as f64;
        sampler.sample(&sample!("r", ts * (i + 1) as f64, Rate, at ts)).unwrap();
        sampler.flush(ts + 0.5, &mut out);
    }
    sampler.flush_all(&mut out);

    assert_eq!(
        points_by_name(&out)["r"],
        vec![(1010.0, 102.0), (1020.0, 104.0), (1030.0, 106.0), (1040.0, 108.0)]
    );
}

#[test]
fn test_unbucketable_timestamp_is_dropped() {
    let (mut sampler, registry) = test_sampler();

    let err = sampler.sample(&sample!("g", 1.0, Gauge, at 1e30)).unwrap_err();
    assert_eq!(err.category(), "invalid_timestamp");
    sampler.sample(&sample!("g", 2.0, Gauge, at 1001.0)).unwrap();

    let mut out: Vec<Serie> = Vec::new();
    sampler.flush_all(&mut out);
    assert_eq!(points_by_name(&out)["g"], vec![(1000.0, 2.0)]);
    assert_eq!(registry.value("aggregator__dropped_samples", &["invalid_timestamp"]), Some(1.0));
}
