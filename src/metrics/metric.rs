//! Accumulator trait and the table that builds accumulators per sample type.

use crate::core::{Result, TesseraError};
use crate::metrics::histogram::{Histogram, HistogramSettings};
use crate::metrics::types::{MetricSample, MetricType, Point};
use crate::metrics::{
    count::Count, counter::Counter, gauge::Gauge, historate::Historate,
    monotonic_count::MonotonicCount, rate::Rate, serie::Serie, set::Set,
};
use std::fmt;
use std::sync::Arc;

/// Per-context aggregation state for one metric kind.
///
/// An accumulator is only ever touched by its owner, which holds it by
/// `&mut`; implementations need no synchronization.
pub trait Metric: Send {
    /// Fold a sample into the state. `timestamp` is the sample time in seconds.
    fn add_sample(&mut self, sample: &MetricSample, timestamp: f64);

    /// Produce the series for the interval ending at `timestamp` and reset
    /// the per-interval state. `Ok(None)` means nothing to report this time.
    fn flush(&mut self, timestamp: f64) -> Result<Option<Vec<Serie>>>;

    /// True when state must survive a flush (rates, monotonic counts, ...)
    fn is_stateful(&self) -> bool;

    /// Last observation a later accumulator of the same context should
    /// continue from. Only stateful kinds have one.
    fn reference(&self) -> Option<Point> {
        None
    }

    /// Continue from `reference`, the last observation of an older
    /// accumulator of the same context. The first sample of this one is
    /// then measured against it instead of being used as a bare reference.
    fn resume(&mut self, _reference: Point) {}
}

/// What a constructor gets to know about the context it builds for
pub struct BuildContext<'a> {
    /// Bucket interval in seconds
    pub interval: i64,
    /// Histogram output settings
    pub histogram: &'a Arc<HistogramSettings>,
}

/// Builds an empty accumulator
pub type Constructor = fn(&BuildContext<'_>) -> Box<dyn Metric>;

/// Constructor table indexed by [`MetricType`]
#[derive(Clone)]
pub struct MetricFactory {
    constructors: [Option<Constructor>; MetricType::COUNT],
    histogram: Arc<HistogramSettings>,
}

impl MetricFactory {
    /// Factory with no registered type
    pub fn empty(histogram: HistogramSettings) -> Self {
        Self {
            constructors: [None; MetricType::COUNT],
            histogram: Arc::new(histogram),
        }
    }

    /// Factory for every type aggregated by the agent. Distributions are left
    /// unregistered.
    pub fn standard(histogram: HistogramSettings) -> Self {
        let mut factory = Self::empty(histogram);
        factory
            .register(MetricType::Gauge, |_| Box::<Gauge>::default())
            .register(MetricType::Rate, |_| Box::<Rate>::default())
            .register(MetricType::Count, |_| Box::<Count>::default())
            .register(MetricType::MonotonicCount, |_| Box::<MonotonicCount>::default())
            .register(MetricType::Counter, |ctx| Box::new(Counter::new(ctx.interval)))
            .register(MetricType::Histogram, |ctx| {
                Box::new(Histogram::new(ctx.interval, Arc::clone(ctx.histogram)))
            })
            .register(MetricType::Historate, |ctx| {
                Box::new(Historate::new(ctx.interval, Arc::clone(ctx.histogram)))
            })
            .register(MetricType::Set, |_| Box::<Set>::default());
        factory
    }

    /// Register (or replace) the constructor for `mtype`
    pub fn register(&mut self, mtype: MetricType, constructor: Constructor) -> &mut Self {
        self.constructors[mtype.index()] = Some(constructor);
        self
    }

    /// Remove the constructor for `mtype`
    pub fn unregister(&mut self, mtype: MetricType) -> &mut Self {
        self.constructors[mtype.index()] = None;
        self
    }

    /// True when `mtype` can be built
    pub fn supports(&self, mtype: MetricType) -> bool {
        self.constructors[mtype.index()].is_some()
    }

    /// Build an empty accumulator for `mtype`
    pub fn build(&self, mtype: MetricType, interval: i64) -> Result<Box<dyn Metric>> {
        let constructor = self.constructors[mtype.index()]
            .ok_or_else(|| TesseraError::UnknownMetricType(mtype.to_string()))?;
        let ctx = BuildContext {
            interval,
            histogram: &self.histogram,
        };
        Ok(constructor(&ctx))
    }
}

impl Default for MetricFactory {
    fn default() -> Self {
        Self::standard(HistogramSettings::default())
    }
}

impl fmt::Debug for MetricFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = MetricType::ALL
            .iter()
            .filter(|t| self.supports(**t))
            .map(|t| t.as_str())
            .collect();
        f.debug_struct("MetricFactory").field("registered", &registered).finish()
    }
}
