//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;
use tessera_lib::aggregator::TimeSampler;
use tessera_lib::core::{Config, ConfigBuilder};
use tessera_lib::metrics::{MetricSample, MetricType, Serie};
use tessera_lib::tagset::Tags;
use tessera_lib::telemetry::Registry;

/// Test fixture builder for creating samples with sensible defaults.
pub struct TestSampleBuilder {
    name: String,
    value: f64,
    mtype: MetricType,
    tags: Vec<String>,
    host: String,
    timestamp: f64,
    sample_rate: f64,
}

impl TestSampleBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            value: 1.0,
            mtype: MetricType::Gauge,
            tags: vec!["env:test".to_string()],
            host: "test-host".to_string(),
            timestamp: 1000.0,
            sample_rate: 1.0,
        }
    }

    pub fn value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn mtype(mut self, mtype: MetricType) -> Self {
        self.mtype = mtype;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    pub fn build(self) -> MetricSample {
        MetricSample::new(self.name, self.value, self.mtype)
            .with_tags(Tags::new(&self.tags))
            .with_host(self.host)
            .with_sample_rate(self.sample_rate)
            .at(self.timestamp)
    }
}

/// Configuration with 10s buckets and a 5 minute context expiry.
pub fn test_config(shards: usize) -> Config {
    ConfigBuilder::new()
        .bucket_interval(Duration::from_secs(10))
        .context_expiry(Duration::from_secs(300))
        .shards(shards)
        .build()
        .unwrap()
}

/// A single-shard sampler on its own registry.
pub fn test_sampler() -> (TimeSampler, Registry) {
    let registry = Registry::new();
    let sampler = TimeSampler::new(0, &test_config(1).aggregator, &registry);
    (sampler, registry)
}

/// Series grouped by name, points in flush order.
pub fn points_by_name(series: &[Serie]) -> BTreeMap<String, Vec<(f64, f64)>> {
    let mut out: BTreeMap<String, Vec<(f64, f64)>> = BTreeMap::new();
    for s in series {
        out.entry(s.name().to_string())
            .or_default()
            .extend(s.points().iter().map(|p| (p.ts, p.value)));
    }
    out
}

/// Verify that all series of a context are next to each other.
pub fn assert_contexts_contiguous(series: &[Serie]) {
    let mut seen = std::collections::HashSet::new();
    let mut last = None;
    for s in series {
        let key = s.context_key();
        if last != Some(key) {
            assert!(seen.insert(key), "series of context {} are not contiguous", key);
            last = Some(key);
        }
    }
}

/// Macro for creating a test sample quickly.
#[macro_export]
macro_rules! sample {
    ($name:expr, $value:expr, $mtype:ident) => {
        TestSampleBuilder::new($name)
            .value($value)
            .mtype(MetricType::$mtype)
            .build()
    };
    ($name:expr, $value:expr, $mtype:ident, at $ts:expr) => {
        TestSampleBuilder::new($name)
            .value($value)
            .mtype(MetricType::$mtype)
            .at($ts)
            .build()
    };
}
