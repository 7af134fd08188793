//! Historate: histogram of the rates between consecutive samples.

use crate::core::Result;
use crate::metrics::histogram::{Histogram, HistogramSettings};
use crate::metrics::metric::Metric;
use crate::metrics::serie::Serie;
use crate::metrics::types::{MetricSample, Point};
use std::sync::Arc;

/// Rates between consecutive samples, summarized like a histogram.
///
/// The last sample is kept across flushes. Two samples with the same
/// timestamp yield no rate.
#[derive(Debug)]
pub struct Historate {
    histogram: Histogram,
    previous: Option<(f64, f64)>,
    // first sample seen without any reference, until a flush or a resume
    unreferenced: Option<(f64, f64)>,
    sampled: bool,
}

impl Historate {
    /// New historate for buckets of `interval` seconds
    pub fn new(interval: i64, settings: Arc<HistogramSettings>) -> Self {
        Self {
            histogram: Histogram::new(interval, settings),
            previous: None,
            unreferenced: None,
            sampled: false,
        }
    }

    fn add_rate(&mut self, from: (f64, f64), to: (f64, f64)) {
        if to.1 != from.1 {
            self.histogram.add_value((to.0 - from.0) / (to.1 - from.1), 1.0);
            self.sampled = true;
        }
    }
}

impl Metric for Historate {
    fn add_sample(&mut self, sample: &MetricSample, timestamp: f64) {
        let observation = (sample.value, timestamp);
        match self.previous {
            Some(previous) => self.add_rate(previous, observation),
            None => self.unreferenced = Some(observation),
        }
        self.previous = Some(observation);
    }

    fn flush(&mut self, timestamp: f64) -> Result<Option<Vec<Serie>>> {
        self.unreferenced = None;
        if !self.sampled {
            return Ok(None);
        }
        self.sampled = false;
        self.histogram.flush(timestamp)
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn reference(&self) -> Option<Point> {
        self.previous.map(|(value, ts)| Point { ts, value })
    }

    fn resume(&mut self, reference: Point) {
        if let Some(first) = self.unreferenced.take() {
            self.add_rate((reference.value, reference.ts), first);
        }
    }
}
