//! Per-context accumulators of one time bucket.

use crate::ckey::ContextKey;
use crate::core::{Result, TesseraError};
use crate::metrics::metric::{Metric, MetricFactory};
use crate::metrics::serie::Serie;
use crate::metrics::types::{MetricSample, Point};
use crate::telemetry::{Counter, Registry};
use rustc_hash::FxHashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

/// Counts accumulators created, split by statefulness
#[derive(Clone)]
pub struct AddSampleTelemetry {
    total: Counter,
    stateful: Counter,
    stateless: Counter,
}

impl AddSampleTelemetry {
    /// Register the counters in `registry`
    pub fn new(registry: &Registry) -> Self {
        let created = registry.counter(
            "aggregator",
            "contexts_created",
            &["state"],
            "Accumulators created for new contexts",
        );
        Self {
            total: created.with_values(&["total"]),
            stateful: created.with_values(&["stateful"]),
            stateless: created.with_values(&["stateless"]),
        }
    }

    /// Record one new accumulator
    pub fn inc(&self, is_stateful: bool) {
        self.total.inc();
        if is_stateful {
            self.stateful.inc();
        } else {
            self.stateless.inc();
        }
    }

    /// Accumulators created so far
    pub fn total(&self) -> u64 {
        self.total.get()
    }
}

/// Output of [`ContextMetrics::flush`]
#[derive(Default)]
pub struct ContextFlush {
    /// Series of every context that had something to report
    pub series: Vec<Serie>,
    /// Flush failures by context
    pub errors: FxHashMap<ContextKey, TesseraError>,
    /// Stateful accumulators removed by the flush, to be re-adopted later
    pub carried: Vec<(ContextKey, Box<dyn Metric>)>,
}

impl fmt::Debug for ContextFlush {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextFlush")
            .field("series", &self.series.len())
            .field("errors", &self.errors)
            .field("carried", &self.carried.len())
            .finish()
    }
}

/// Flush one accumulator, binding its series to `key`. `Ok(None)` becomes
/// an empty vector.
pub(crate) fn flush_metric(
    key: ContextKey,
    metric: &mut dyn Metric,
    timestamp: f64,
) -> Result<Vec<Serie>> {
    let mut series = metric.flush(timestamp)?.unwrap_or_default();
    for serie in &mut series {
        serie.bind_key(key);
    }
    Ok(series)
}

/// Accumulators by context key.
///
/// Accumulators are created lazily from the [`MetricFactory`] on the first
/// sample of a context. Not synchronized: the owner serializes access.
pub struct ContextMetrics {
    metrics: FxHashMap<ContextKey, Box<dyn Metric>>,
    factory: Arc<MetricFactory>,
}

impl ContextMetrics {
    /// Empty store using the standard accumulators
    pub fn new() -> Self {
        Self::with_factory(Arc::new(MetricFactory::default()))
    }

    /// Empty store using `factory`
    pub fn with_factory(factory: Arc<MetricFactory>) -> Self {
        Self {
            metrics: FxHashMap::default(),
            factory,
        }
    }

    /// Fold `sample` into the accumulator of `key`, creating it if needed.
    ///
    /// Non-finite values and unknown types are rejected without touching the
    /// store.
    pub fn add_sample(
        &mut self,
        key: ContextKey,
        sample: &MetricSample,
        timestamp: f64,
        interval: i64,
        telemetry: Option<&AddSampleTelemetry>,
    ) -> Result<()> {
        if !sample.value.is_finite() {
            return Err(TesseraError::InvalidSample {
                value: sample.value,
            });
        }

        match self.metrics.entry(key) {
            Entry::Occupied(entry) => entry.into_mut().add_sample(sample, timestamp),
            Entry::Vacant(entry) => {
                let metric = match self.factory.build(sample.mtype, interval) {
                    Ok(metric) => metric,
                    Err(e) => {
                        tracing::error!(metric = %sample.name, error = %e, "cannot aggregate sample");
                        return Err(e);
                    },
                };
                if let Some(t) = telemetry {
                    t.inc(metric.is_stateful());
                }
                entry.insert(metric).add_sample(sample, timestamp);
            },
        }
        Ok(())
    }

    /// Flush and remove every accumulator.
    ///
    /// Failures are collected per context and never stop the other contexts
    /// from flushing. Stateful accumulators are handed back in `carried`.
    pub fn flush(&mut self, timestamp: f64) -> ContextFlush {
        let mut out = ContextFlush::default();
        for (key, mut metric) in self.metrics.drain() {
            match flush_metric(key, metric.as_mut(), timestamp) {
                Ok(series) => out.series.extend(series),
                Err(e) => {
                    out.errors.insert(key, e);
                },
            }
            if metric.is_stateful() {
                out.carried.push((key, metric));
            }
        }
        out
    }

    /// Put back an accumulator carried over from an earlier flush. Does
    /// nothing (and returns false) if the context already has one.
    pub fn adopt(&mut self, key: ContextKey, metric: Box<dyn Metric>) -> bool {
        match self.metrics.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(metric);
                true
            },
        }
    }

    /// Let the accumulator of `key` continue from the last observation of an
    /// older one. Returns false if the context has no accumulator here.
    pub fn resume(&mut self, key: ContextKey, reference: Point) -> bool {
        match self.metrics.get_mut(&key) {
            Some(metric) => {
                metric.resume(reference);
                true
            },
            None => false,
        }
    }

    /// Take the accumulator of `key` out of the store
    pub fn remove(&mut self, key: ContextKey) -> Option<Box<dyn Metric>> {
        self.metrics.remove(&key)
    }

    /// True when `key` has an accumulator
    pub fn contains(&self, key: ContextKey) -> bool {
        self.metrics.contains_key(&key)
    }

    /// Context keys in ascending order
    pub fn sorted_keys(&self) -> Vec<ContextKey> {
        let mut keys: Vec<ContextKey> = self.metrics.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Number of contexts
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// True when no context is stored
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl Default for ContextMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContextMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextMetrics").field("contexts", &self.metrics.len()).finish()
    }
}
