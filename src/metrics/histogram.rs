//! Histogram: distribution of the values of one interval, summarized on the
//! agent into aggregates (max, median, ...) and percentiles.

use crate::core::config::{HistogramAggregate, HistogramConfig};
use crate::core::Result;
use crate::metrics::metric::Metric;
use crate::metrics::serie::Serie;
use crate::metrics::types::{ApiMetricType, MetricSample};
use std::borrow::Cow;
use std::sync::Arc;

/// One percentile output
#[derive(Debug, Clone, PartialEq)]
pub struct Percentile {
    /// Quantile in (0, 1)
    pub quantile: f64,
    /// Name suffix, e.g. `.95percentile`
    pub suffix: Cow<'static, str>,
}

impl Percentile {
    /// Percentile for `quantile`, named after its whole percent
    pub fn new(quantile: f64) -> Self {
        let percent = (quantile * 100.0 + 1e-9).floor() as i64;
        Self {
            quantile,
            suffix: Cow::Owned(format!(".{}percentile", percent)),
        }
    }
}

/// Which series a histogram emits
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramSettings {
    /// Aggregates, in output order
    pub aggregates: Vec<HistogramAggregate>,
    /// Percentiles, emitted after the aggregates
    pub percentiles: Vec<Percentile>,
}

impl HistogramSettings {
    /// Settings from the configuration section
    pub fn from_config(config: &HistogramConfig) -> Self {
        Self {
            aggregates: config.aggregates.clone(),
            percentiles: config.percentiles.iter().map(|q| Percentile::new(*q)).collect(),
        }
    }
}

impl Default for HistogramSettings {
    fn default() -> Self {
        Self::from_config(&HistogramConfig::default())
    }
}

fn aggregate_suffix(aggregate: HistogramAggregate) -> &'static str {
    match aggregate {
        HistogramAggregate::Max => ".max",
        HistogramAggregate::Min => ".min",
        HistogramAggregate::Median => ".median",
        HistogramAggregate::Avg => ".avg",
        HistogramAggregate::Sum => ".sum",
        HistogramAggregate::Count => ".count",
    }
}

#[derive(Debug, Clone, Copy)]
struct WeightedSample {
    value: f64,
    weight: f64,
}

/// Weighted samples of one interval
#[derive(Debug)]
pub struct Histogram {
    samples: Vec<WeightedSample>,
    sum: f64,
    count: f64,
    interval: i64,
    settings: Arc<HistogramSettings>,
}

impl Histogram {
    /// New histogram for buckets of `interval` seconds (0 is treated as 1)
    pub fn new(interval: i64, settings: Arc<HistogramSettings>) -> Self {
        Self {
            samples: Vec::new(),
            sum: 0.0,
            count: 0.0,
            interval: if interval > 0 { interval } else { 1 },
            settings,
        }
    }

    pub(crate) fn add_value(&mut self, value: f64, weight: f64) {
        self.samples.push(WeightedSample { value, weight });
        self.sum += value * weight;
        self.count += weight;
    }

    /// Value at quantile `q` of the sorted samples, weights included
    fn quantile(&self, q: f64) -> f64 {
        let target = (self.count * q - 1e-9).ceil().max(1.0);
        let mut seen = 0.0;
        for s in &self.samples {
            seen += s.weight;
            if seen >= target - 1e-9 {
                return s.value;
            }
        }
        self.samples.last().map_or(0.0, |s| s.value)
    }

    fn aggregate(&self, aggregate: HistogramAggregate, timestamp: f64) -> Serie {
        let (mtype, value) = match aggregate {
            HistogramAggregate::Max => (ApiMetricType::Gauge, self.samples[self.samples.len() - 1].value),
            HistogramAggregate::Min => (ApiMetricType::Gauge, self.samples[0].value),
            HistogramAggregate::Median => (ApiMetricType::Gauge, self.quantile(0.5)),
            HistogramAggregate::Avg => (ApiMetricType::Gauge, self.sum / self.count),
            HistogramAggregate::Sum => (ApiMetricType::Gauge, self.sum),
            HistogramAggregate::Count => {
                let rate = self.count / self.interval as f64;
                return Serie::point(ApiMetricType::Rate, timestamp, rate)
                    .suffix(aggregate_suffix(aggregate))
                    .interval(self.interval);
            },
        };
        Serie::point(mtype, timestamp, value).suffix(aggregate_suffix(aggregate))
    }
}

impl Metric for Histogram {
    fn add_sample(&mut self, sample: &MetricSample, _timestamp: f64) {
        self.add_value(sample.value, sample.weight());
    }

    fn flush(&mut self, timestamp: f64) -> Result<Option<Vec<Serie>>> {
        if self.samples.is_empty() {
            return Ok(None);
        }
        self.samples.sort_unstable_by(|a, b| a.value.total_cmp(&b.value));

        let settings = Arc::clone(&self.settings);
        let mut series = Vec::with_capacity(settings.aggregates.len() + settings.percentiles.len());
        for aggregate in &settings.aggregates {
            series.push(self.aggregate(*aggregate, timestamp));
        }
        for p in &settings.percentiles {
            series.push(
                Serie::point(ApiMetricType::Gauge, timestamp, self.quantile(p.quantile))
                    .suffix(p.suffix.clone()),
            );
        }

        self.samples.clear();
        self.sum = 0.0;
        self.count = 0.0;
        Ok(Some(series))
    }

    fn is_stateful(&self) -> bool {
        false
    }
}
