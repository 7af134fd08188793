//! Set: number of distinct values seen during the interval.

use crate::core::Result;
use crate::metrics::metric::Metric;
use crate::metrics::serie::Serie;
use crate::metrics::types::{ApiMetricType, MetricSample};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Distinct raw values, submitted as a gauge of their count
#[derive(Debug, Default)]
pub struct Set {
    values: FxHashSet<Arc<str>>,
}

impl Metric for Set {
    fn add_sample(&mut self, sample: &MetricSample, _timestamp: f64) {
        let raw = match &sample.raw_value {
            Some(raw) => Arc::clone(raw),
            None => Arc::from(sample.value.to_string()),
        };
        self.values.insert(raw);
    }

    fn flush(&mut self, timestamp: f64) -> Result<Option<Vec<Serie>>> {
        if self.values.is_empty() {
            return Ok(None);
        }
        let count = self.values.len() as f64;
        self.values.clear();
        Ok(Some(vec![Serie::point(ApiMetricType::Gauge, timestamp, count)]))
    }

    fn is_stateful(&self) -> bool {
        false
    }
}
