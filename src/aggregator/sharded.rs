//! Shards of time samplers.

use crate::aggregator::time_sampler::{FlushReport, TimeSampler};
use crate::ckey::ContextKeyGenerator;
use crate::core::config::AggregatorConfig;
use crate::core::{Result, TesseraError};
use crate::metrics::{HistogramSettings, MetricFactory, MetricSample, SerieSink};
use crate::telemetry::Registry;
use parking_lot::Mutex;
use std::sync::Arc;

/// Independent [`TimeSampler`]s, each behind its own lock.
///
/// A context always lands on the same shard, so every context is still
/// mutated by a single owner at a time. Deduplication of contexts and tag
/// sets is per shard.
pub struct ShardedAggregator {
    shards: Vec<Mutex<TimeSampler>>,
    key_generator: ContextKeyGenerator,
}

impl ShardedAggregator {
    /// Aggregator with the standard accumulators
    pub fn new(config: &AggregatorConfig, registry: &Registry) -> Result<Self> {
        let factory = MetricFactory::standard(HistogramSettings::from_config(&config.histogram));
        Self::with_factory(config, factory, registry)
    }

    /// Aggregator building accumulators with `factory`
    pub fn with_factory(
        config: &AggregatorConfig,
        factory: MetricFactory,
        registry: &Registry,
    ) -> Result<Self> {
        if config.shards == 0 {
            return Err(TesseraError::config("shards must be greater than 0"));
        }
        let factory = Arc::new(factory);
        let shards = (0..config.shards)
            .map(|id| Mutex::new(TimeSampler::with_factory(id, config, Arc::clone(&factory), registry)))
            .collect();

        tracing::debug!(shards = config.shards, "aggregator created");
        Ok(Self {
            shards,
            key_generator: ContextKeyGenerator::new(),
        })
    }

    /// Aggregate one sample on the shard owning its context
    pub fn sample(&self, sample: &MetricSample) -> Result<()> {
        let key = self.key_generator.generate(&sample.name, &sample.host, &sample.tags);
        let shard = (key.raw() % self.shards.len() as u64) as usize;
        self.shards[shard].lock().sample_keyed(key, sample)
    }

    /// Flush complete buckets of every shard, one shard at a time
    pub fn flush<S: SerieSink + ?Sized>(&self, cutoff: f64, sink: &mut S) -> FlushReport {
        let mut report = FlushReport::default();
        for shard in &self.shards {
            report += shard.lock().flush(cutoff, sink);
        }
        report
    }

    /// Flush every bucket of every shard
    pub fn flush_all<S: SerieSink + ?Sized>(&self, sink: &mut S) -> FlushReport {
        self.flush(f64::INFINITY, sink)
    }

    /// Number of shards
    pub fn shards(&self) -> usize {
        self.shards.len()
    }

    /// Contexts tracked across shards
    pub fn contexts(&self) -> usize {
        self.shards.iter().map(|s| s.lock().resolver().len()).sum()
    }
}
