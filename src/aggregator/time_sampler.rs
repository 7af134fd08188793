//! Time bucketing of samples for one shard.

use crate::aggregator::context::ContextResolver;
use crate::aggregator::tags_tlm::TagsTlm;
use crate::ckey::ContextKey;
use crate::core::config::AggregatorConfig;
use crate::core::{Result, TesseraError};
use crate::metrics::{
    flush_and_clear, AddSampleTelemetry, ContextMetrics, HistogramSettings, Metric,
    MetricFactory, MetricSample, SerieSink, TimestampedContextMetrics,
};
use crate::telemetry::{Counter, CounterVec, Gauge, Registry};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::ops::AddAssign;
use std::sync::Arc;

/// What a flush did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Buckets flushed
    pub buckets: usize,
    /// Series sent to the sink
    pub series: usize,
    /// Context flushes that failed
    pub errors: usize,
    /// Contexts forgotten after being idle
    pub expired: usize,
}

impl AddAssign for FlushReport {
    fn add_assign(&mut self, other: Self) {
        self.buckets += other.buckets;
        self.series += other.series;
        self.errors += other.errors;
        self.expired += other.expired;
    }
}

struct SamplerTelemetry {
    add_sample: AddSampleTelemetry,
    dropped: CounterVec,
    flushed: Counter,
    flush_errors: Counter,
    contexts: Gauge,
}

impl SamplerTelemetry {
    fn new(name: &str, registry: &Registry) -> Self {
        Self {
            add_sample: AddSampleTelemetry::new(registry),
            dropped: registry.counter(
                "aggregator",
                "dropped_samples",
                &["reason"],
                "Samples that could not be aggregated",
            ),
            flushed: registry
                .counter("aggregator", "flushed_series", &[], "Series produced by flushes")
                .with_values(&[]),
            flush_errors: registry
                .counter("aggregator", "flush_errors", &[], "Contexts that failed to flush")
                .with_values(&[]),
            contexts: registry
                .gauge("aggregator", "contexts", &["shard"], "Contexts tracked by a shard")
                .with_values(&[name]),
        }
    }
}

/// Aggregates samples into fixed-width time buckets and flushes the buckets
/// once they are complete.
///
/// Owns the context resolver and tag tracker of its shard. Stateful
/// accumulators (rates, monotonic counts) are parked after a flush and put
/// back into the next bucket their context is sampled into. If a later
/// bucket is already pending for the context, its accumulator continues from
/// the flushed one instead.
pub struct TimeSampler {
    name: String,
    interval: i64,
    context_expiry: f64,
    buckets: BTreeMap<i64, ContextMetrics>,
    resolver: ContextResolver,
    parked: FxHashMap<ContextKey, Box<dyn Metric>>,
    factory: Arc<MetricFactory>,
    telemetry: SamplerTelemetry,
}

impl TimeSampler {
    /// Sampler for shard `id` with the standard accumulators
    pub fn new(id: usize, config: &AggregatorConfig, registry: &Registry) -> Self {
        let factory = MetricFactory::standard(HistogramSettings::from_config(&config.histogram));
        Self::with_factory(id, config, Arc::new(factory), registry)
    }

    /// Sampler for shard `id` building accumulators with `factory`
    pub fn with_factory(
        id: usize,
        config: &AggregatorConfig,
        factory: Arc<MetricFactory>,
        registry: &Registry,
    ) -> Self {
        let name = format!("shard_{}", id);
        let tags_tlm = TagsTlm::new(config.tags_telemetry, &name, registry);

        Self {
            interval: (config.bucket_interval.as_secs() as i64).max(1),
            context_expiry: config.context_expiry.as_secs_f64(),
            buckets: BTreeMap::new(),
            resolver: ContextResolver::new(tags_tlm),
            parked: FxHashMap::default(),
            factory,
            telemetry: SamplerTelemetry::new(&name, registry),
            name,
        }
    }

    /// Start of the bucket holding `timestamp`. None when the bucket or its
    /// end can't be represented, which also covers non-finite timestamps.
    #[inline]
    fn bucket_start(&self, timestamp: f64) -> Option<i64> {
        let slot = (timestamp / self.interval as f64).floor();
        if !(i64::MIN as f64..i64::MAX as f64).contains(&slot) {
            return None;
        }
        let start = (slot as i64).checked_mul(self.interval)?;
        start.checked_add(self.interval)?;
        Some(start)
    }

    /// Aggregate one sample into the bucket of its timestamp
    pub fn sample(&mut self, sample: &MetricSample) -> Result<()> {
        let key = self.resolver.key_of(sample);
        self.sample_keyed(key, sample)
    }

    pub(crate) fn sample_keyed(&mut self, key: ContextKey, sample: &MetricSample) -> Result<()> {
        if !sample.value.is_finite() {
            return Err(self.drop_sample(TesseraError::InvalidSample {
                value: sample.value,
            }));
        }
        if !self.factory.supports(sample.mtype) {
            tracing::error!(metric = %sample.name, mtype = %sample.mtype, "unknown sample metric type");
            return Err(self.drop_sample(TesseraError::UnknownMetricType(
                sample.mtype.to_string(),
            )));
        }

        let Some(start) = self.bucket_start(sample.timestamp) else {
            return Err(self.drop_sample(TesseraError::InvalidTimestamp {
                timestamp: sample.timestamp,
            }));
        };

        if let Err(e) = self.resolver.track_keyed(key, sample, sample.timestamp) {
            return Err(self.drop_sample(e));
        }

        let factory = &self.factory;
        let store = self
            .buckets
            .entry(start)
            .or_insert_with(|| ContextMetrics::with_factory(Arc::clone(factory)));

        if !store.contains(key) {
            if let Some(metric) = self.parked.remove(&key) {
                store.adopt(key, metric);
            }
        }

        let result = store.add_sample(
            key,
            sample,
            sample.timestamp,
            self.interval,
            Some(&self.telemetry.add_sample),
        );
        result.map_err(|e| self.drop_sample(e))
    }

    fn drop_sample(&self, e: TesseraError) -> TesseraError {
        self.telemetry.dropped.inc(&[e.category()]);
        e
    }

    /// Flush every bucket that ends at or before `cutoff` into `sink`, then
    /// expire idle contexts.
    pub fn flush<S: SerieSink + ?Sized>(&mut self, cutoff: f64, sink: &mut S) -> FlushReport {
        let interval = self.interval;
        let due: Vec<i64> = self
            .buckets
            .keys()
            .copied()
            .take_while(|start| start.saturating_add(interval) as f64 <= cutoff)
            .collect();

        let mut pending: Vec<TimestampedContextMetrics> = due
            .iter()
            .filter_map(|start| {
                self.buckets
                    .remove(start)
                    .map(|cm| TimestampedContextMetrics::new(*start as f64, cm))
            })
            .collect();

        let resolver = &self.resolver;
        let merge = flush_and_clear(&mut pending, |key, series| match resolver.get(key) {
            Some(ctx) => {
                for mut serie in series {
                    serie.bind_context(&ctx.name, &ctx.host, &ctx.tags);
                    sink.put(serie);
                }
            },
            None => tracing::warn!(context = %key, "flushed context is not tracked, dropping its series"),
        });

        for (key, errors) in &merge.errors {
            for e in errors {
                tracing::warn!(context = %key, error = %e, "failed to flush context");
            }
        }
        let errors = merge.errors.values().map(Vec::len).sum();
        self.telemetry.flushed.add(merge.series_count as u64);
        self.telemetry.flush_errors.add(errors as u64);

        for (key, metric) in merge.carried {
            // a later bucket already holds the context: continue from there
            match self.buckets.values_mut().find(|cm| cm.contains(key)) {
                Some(store) => {
                    if let Some(reference) = metric.reference() {
                        store.resume(key, reference);
                    }
                },
                None => {
                    self.parked.insert(key, metric);
                },
            }
        }

        let buckets = &self.buckets;
        let expired = self
            .resolver
            .expire_contexts(cutoff - self.context_expiry, |key| {
                buckets.values().any(|cm| cm.contains(key))
            });
        for key in &expired {
            self.parked.remove(key);
        }
        self.resolver.shrink();
        self.telemetry.contexts.set(self.resolver.len() as f64);

        FlushReport {
            buckets: pending.len(),
            series: merge.series_count,
            errors,
            expired: expired.len(),
        }
    }

    /// Flush every bucket regardless of its time
    pub fn flush_all<S: SerieSink + ?Sized>(&mut self, sink: &mut S) -> FlushReport {
        self.flush(f64::INFINITY, sink)
    }

    /// Name used in telemetry
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bucket width in seconds
    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Buckets not flushed yet
    pub fn pending_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Stateful accumulators waiting for their context to come back
    pub fn parked(&self) -> usize {
        self.parked.len()
    }

    /// Context resolver of this shard
    pub fn resolver(&self) -> &ContextResolver {
        &self.resolver
    }
}
