//! Count: the sum of the values of the interval.

use crate::core::Result;
use crate::metrics::metric::Metric;
use crate::metrics::serie::Serie;
use crate::metrics::types::{ApiMetricType, MetricSample};

/// Sums values, submitted as a count
#[derive(Debug, Default)]
pub struct Count {
    value: f64,
    sampled: bool,
}

impl Metric for Count {
    fn add_sample(&mut self, sample: &MetricSample, _timestamp: f64) {
        self.value += sample.value;
        self.sampled = true;
    }

    fn flush(&mut self, timestamp: f64) -> Result<Option<Vec<Serie>>> {
        if !self.sampled {
            return Ok(None);
        }
        let value = self.value;
        self.value = 0.0;
        self.sampled = false;
        Ok(Some(vec![Serie::point(ApiMetricType::Count, timestamp, value)]))
    }

    fn is_stateful(&self) -> bool {
        false
    }
}
