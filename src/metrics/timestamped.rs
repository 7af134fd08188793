//! Flushing several time buckets at once.
//!
//! A context can be present in more than one pending bucket. Each context is
//! flushed once per bucket it appears in, and all of its series are handed
//! out together before the next context is touched.

use crate::ckey::ContextKey;
use crate::core::TesseraError;
use crate::metrics::context_metrics::{flush_metric, ContextMetrics};
use crate::metrics::metric::Metric;
use crate::metrics::serie::Serie;
use rustc_hash::FxHashMap;
use std::fmt;

/// The store of one bucket, with the bucket start time
#[derive(Debug)]
pub struct TimestampedContextMetrics {
    /// Bucket start, in seconds
    pub bucket_timestamp: f64,
    /// Accumulators of the bucket
    pub context_metrics: ContextMetrics,
}

impl TimestampedContextMetrics {
    /// Pair a store with its bucket time
    pub fn new(bucket_timestamp: f64, context_metrics: ContextMetrics) -> Self {
        Self {
            bucket_timestamp,
            context_metrics,
        }
    }
}

/// Outcome of [`flush_and_clear`]
#[derive(Default)]
pub struct MergeReport {
    /// Failures by context, one entry per failing bucket
    pub errors: FxHashMap<ContextKey, Vec<TesseraError>>,
    /// Series handed to the callback
    pub series_count: usize,
    /// Stateful accumulators, the one from the most recent bucket per context
    pub carried: Vec<(ContextKey, Box<dyn Metric>)>,
}

impl fmt::Debug for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeReport")
            .field("errors", &self.errors)
            .field("series_count", &self.series_count)
            .field("carried", &self.carried.len())
            .finish()
    }
}

/// Flush every context of every bucket, oldest bucket first, and leave all
/// buckets empty.
///
/// Contexts of a bucket are visited in ascending key order. When a context
/// is visited it is also flushed (at their own timestamps) from every later
/// bucket that holds it, so `emit` receives each context exactly once with
/// all of its series. Contexts with nothing to report are not emitted.
///
/// A stateful accumulator continues from the one of the previous bucket
/// holding the same context, so a rate spanning two pending buckets is
/// still reported.
pub fn flush_and_clear<F>(buckets: &mut [TimestampedContextMetrics], mut emit: F) -> MergeReport
where
    F: FnMut(ContextKey, Vec<Serie>),
{
    let mut report = MergeReport::default();

    for i in 0..buckets.len() {
        for key in buckets[i].context_metrics.sorted_keys() {
            let mut series = Vec::new();
            let mut latest_stateful = None;
            let mut reference = None;

            for bucket in buckets[i..].iter_mut() {
                let Some(mut metric) = bucket.context_metrics.remove(key) else {
                    continue;
                };
                if let Some(point) = reference.take() {
                    metric.resume(point);
                }
                match flush_metric(key, metric.as_mut(), bucket.bucket_timestamp) {
                    Ok(s) => series.extend(s),
                    Err(e) => report.errors.entry(key).or_default().push(e),
                }
                if metric.is_stateful() {
                    reference = metric.reference();
                    latest_stateful = Some(metric);
                }
            }

            if !series.is_empty() {
                report.series_count += series.len();
                emit(key, series);
            }
            if let Some(metric) = latest_stateful {
                report.carried.push((key, metric));
            }
        }
    }

    report
}
