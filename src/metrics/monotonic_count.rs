//! Monotonic count: the increase of a raw, ever-growing counter.
//!
//! Every positive difference between two consecutive samples is added up;
//! drops (counter resets) are ignored. The last sample is kept across
//! flushes so the first sample of the next interval still yields a delta.

use crate::core::Result;
use crate::metrics::metric::Metric;
use crate::metrics::serie::Serie;
use crate::metrics::types::{ApiMetricType, MetricSample, Point};

/// Sum of positive deltas of a raw counter
#[derive(Debug, Default)]
pub struct MonotonicCount {
    previous: Option<f64>,
    current: Option<f64>,
    last_ts: f64,
    // first sample seen without any reference, until a flush or a resume
    unreferenced: Option<f64>,
    value: f64,
    has_delta: bool,
}

impl MonotonicCount {
    fn add_delta(&mut self, from: f64, to: f64) {
        let diff = to - from;
        if diff > 0.0 {
            self.value += diff;
        }
        self.has_delta = true;
    }
}

impl Metric for MonotonicCount {
    fn add_sample(&mut self, sample: &MetricSample, timestamp: f64) {
        if let Some(current) = self.current.take() {
            self.previous = Some(current);
        } else if self.previous.is_none() {
            self.unreferenced = Some(sample.value);
        }
        self.current = Some(sample.value);
        self.last_ts = timestamp;

        if let Some(previous) = self.previous {
            self.add_delta(previous, sample.value);
        }
    }

    fn flush(&mut self, timestamp: f64) -> Result<Option<Vec<Serie>>> {
        self.unreferenced = None;
        if !self.has_delta {
            return Ok(None);
        }
        let value = self.value;
        if let Some(current) = self.current.take() {
            self.previous = Some(current);
        }
        self.value = 0.0;
        self.has_delta = false;
        Ok(Some(vec![Serie::point(ApiMetricType::Count, timestamp, value)]))
    }

    fn is_stateful(&self) -> bool {
        true
    }

    fn reference(&self) -> Option<Point> {
        self.current.or(self.previous).map(|value| Point {
            ts: self.last_ts,
            value,
        })
    }

    fn resume(&mut self, reference: Point) {
        if let Some(first) = self.unreferenced.take() {
            self.add_delta(reference.value, first);
        }
    }
}
