//! Sample-side metric types.

use crate::core::TesseraError;
use crate::tagset::Tags;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Kind of an incoming sample. Decides which accumulator aggregates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricType {
    /// Last value wins
    Gauge,
    /// Per-second rate between two consecutive check runs
    Rate,
    /// Sum of values, submitted as a count
    Count,
    /// Sum of positive deltas of a raw monotonic counter
    MonotonicCount,
    /// Sum of values divided by the interval, submitted as a rate
    Counter,
    /// Distribution summarized on the agent
    Histogram,
    /// Histogram of the rates between consecutive samples
    Historate,
    /// Count of distinct values
    Set,
    /// Distribution summarized server-side. Not aggregated by the context
    /// store; samples are routed to a sketch pipeline elsewhere.
    Distribution,
}

impl MetricType {
    /// Number of variants
    pub const COUNT: usize = 9;

    /// All variants, in index order
    pub const ALL: [MetricType; Self::COUNT] = [
        MetricType::Gauge,
        MetricType::Rate,
        MetricType::Count,
        MetricType::MonotonicCount,
        MetricType::Counter,
        MetricType::Histogram,
        MetricType::Historate,
        MetricType::Set,
        MetricType::Distribution,
    ];

    /// Dense index, for constructor tables
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Gauge => "gauge",
            MetricType::Rate => "rate",
            MetricType::Count => "count",
            MetricType::MonotonicCount => "monotonic_count",
            MetricType::Counter => "counter",
            MetricType::Histogram => "histogram",
            MetricType::Historate => "historate",
            MetricType::Set => "set",
            MetricType::Distribution => "distribution",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = TesseraError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| TesseraError::UnknownMetricType(s.to_string()))
    }
}

/// Type of a flushed serie as understood by the intake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiMetricType {
    /// Value at a point in time
    Gauge,
    /// Total over the interval
    Count,
    /// Per-second value over the interval
    Rate,
}

impl ApiMetricType {
    /// Stable lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiMetricType::Gauge => "gauge",
            ApiMetricType::Count => "count",
            ApiMetricType::Rate => "rate",
        }
    }
}

/// One timestamped value of a serie
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Seconds since the epoch
    pub ts: f64,
    /// Value
    pub value: f64,
}

/// A metric sample as handed over by the ingestion layer
#[derive(Debug, Clone)]
pub struct MetricSample {
    /// Metric name
    pub name: Arc<str>,
    /// Numeric value (ignored by sets when `raw_value` is present)
    pub value: f64,
    /// Raw value, used by sets
    pub raw_value: Option<Arc<str>>,
    /// Sample kind
    pub mtype: MetricType,
    /// Tags
    pub tags: Tags,
    /// Originating host, empty when unknown
    pub host: Arc<str>,
    /// Client-side sampling rate in (0, 1]
    pub sample_rate: f64,
    /// Seconds since the epoch
    pub timestamp: f64,
}

impl MetricSample {
    /// New sample with no tags, no host, a sample rate of 1 and timestamp 0
    pub fn new(name: impl Into<Arc<str>>, value: f64, mtype: MetricType) -> Self {
        Self {
            name: name.into(),
            value,
            raw_value: None,
            mtype,
            tags: Tags::empty(),
            host: Arc::from(""),
            sample_rate: 1.0,
            timestamp: 0.0,
        }
    }

    /// Set the tags
    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<Arc<str>>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the sample rate
    pub fn with_sample_rate(mut self, rate: f64) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Set the raw (set) value
    pub fn with_raw_value(mut self, raw: impl Into<Arc<str>>) -> Self {
        self.raw_value = Some(raw.into());
        self
    }

    /// Set the timestamp
    pub fn at(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// `1 / sample_rate`, treating invalid rates as 1
    #[inline]
    pub fn weight(&self) -> f64 {
        if self.sample_rate > 0.0 && self.sample_rate <= 1.0 {
            1.0 / self.sample_rate
        } else {
            1.0
        }
    }
}
