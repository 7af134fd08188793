//! Counter: the sum of the values of the interval, reported per second.

use crate::core::Result;
use crate::metrics::metric::Metric;
use crate::metrics::serie::Serie;
use crate::metrics::types::{ApiMetricType, MetricSample};

/// Sums sample-rate-corrected values and submits them as a rate
#[derive(Debug)]
pub struct Counter {
    value: f64,
    sampled: bool,
    interval: i64,
}

impl Counter {
    /// New counter for buckets of `interval` seconds (0 is treated as 1)
    pub fn new(interval: i64) -> Self {
        Self {
            value: 0.0,
            sampled: false,
            interval: if interval > 0 { interval } else { 1 },
        }
    }
}

impl Metric for Counter {
    fn add_sample(&mut self, sample: &MetricSample, _timestamp: f64) {
        self.value += sample.value * sample.weight();
        self.sampled = true;
    }

    fn flush(&mut self, timestamp: f64) -> Result<Option<Vec<Serie>>> {
        if !self.sampled {
            return Ok(None);
        }
        let value = self.value / self.interval as f64;
        self.value = 0.0;
        self.sampled = false;
        Ok(Some(vec![
            Serie::point(ApiMetricType::Rate, timestamp, value).interval(self.interval)
        ]))
    }

    fn is_stateful(&self) -> bool {
        false
    }
}
