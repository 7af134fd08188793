//! Configuration management for Tessera.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Validation and defaults
//! - A builder for programmatic construction

use crate::core::{Result, TesseraError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for Tessera
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Aggregation configuration
    pub aggregator: AggregatorConfig,
    /// Tag-set cache configuration
    pub tagset: TagsetConfig,
    /// String interner configuration
    pub interner: InternerConfig,
    /// Flushed series hand-off configuration
    pub serie_buffer: SerieBufferConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Width of a time bucket
    #[serde(with = "humantime_serde")]
    pub bucket_interval: Duration,
    /// How often the flusher runs
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Number of independent shards
    pub shards: usize,
    /// Idle time after which a context (and its carried state) is forgotten
    #[serde(with = "humantime_serde")]
    pub context_expiry: Duration,
    /// Track tag-set reference counts
    pub tags_telemetry: bool,
    /// Histogram output configuration
    pub histogram: HistogramConfig,
}

/// Histogram output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramConfig {
    /// Aggregates emitted for every histogram
    pub aggregates: Vec<HistogramAggregate>,
    /// Percentiles emitted for every histogram, in (0, 1)
    pub percentiles: Vec<f64>,
}

/// Histogram aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistogramAggregate {
    Max,
    Min,
    Median,
    Avg,
    Sum,
    Count,
}

/// Tag-set cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagsetConfig {
    /// Inserts into the current generation before rotating
    pub inserts_per_rotation: usize,
    /// Number of generations kept
    pub cache_count: usize,
}

/// String interner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InternerConfig {
    /// Entries stored before the table is reset
    pub max_size: usize,
}

/// Flushed series hand-off configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SerieBufferConfig {
    /// Number of batches the channel holds
    pub channel_size: usize,
    /// Series per batch
    pub batch_size: usize,
    /// Behavior when the channel is full
    pub overflow: OverflowKind,
    /// Wait before dropping a batch with `overflow: timeout`
    #[serde(with = "humantime_serde")]
    pub send_timeout: Duration,
}

/// Behavior when the series channel is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowKind {
    Block,
    Timeout,
    DropOldest,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Include targets, thread ids and line numbers
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            bucket_interval: Duration::from_secs(10),
            flush_interval: Duration::from_secs(15),
            shards: 1,
            context_expiry: Duration::from_secs(300),
            tags_telemetry: true,
            histogram: HistogramConfig::default(),
        }
    }
}

impl Default for HistogramConfig {
    fn default() -> Self {
        HistogramConfig {
            aggregates: vec![
                HistogramAggregate::Max,
                HistogramAggregate::Median,
                HistogramAggregate::Avg,
                HistogramAggregate::Count,
            ],
            percentiles: vec![0.95],
        }
    }
}

impl Default for TagsetConfig {
    fn default() -> Self {
        TagsetConfig {
            inserts_per_rotation: 10_000,
            cache_count: 3,
        }
    }
}

impl Default for InternerConfig {
    fn default() -> Self {
        InternerConfig { max_size: 4096 }
    }
}

impl Default for SerieBufferConfig {
    fn default() -> Self {
        SerieBufferConfig {
            channel_size: 100,
            batch_size: 4000,
            overflow: OverflowKind::Block,
            send_timeout: Duration::from_secs(1),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let agg = &self.aggregator;
        if agg.bucket_interval.as_secs() == 0 {
            return Err(TesseraError::config("bucket_interval must be at least one second"));
        }

        if agg.flush_interval.is_zero() {
            return Err(TesseraError::config("flush_interval must be greater than 0"));
        }

        if agg.shards == 0 {
            return Err(TesseraError::config("shards must be greater than 0"));
        }

        for p in &agg.histogram.percentiles {
            if !(*p > 0.0 && *p < 1.0) {
                return Err(TesseraError::config(format!(
                    "Histogram percentiles must be between 0 and 1 (exclusive), got {}",
                    p
                )));
            }
        }

        if self.tagset.inserts_per_rotation == 0 {
            return Err(TesseraError::config("inserts_per_rotation must be greater than 0"));
        }

        if self.tagset.cache_count == 0 {
            return Err(TesseraError::config("cache_count must be greater than 0"));
        }

        if self.serie_buffer.channel_size == 0 || self.serie_buffer.batch_size == 0 {
            return Err(TesseraError::config(
                "serie_buffer channel_size and batch_size must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder starting from defaults
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Replace the configuration with the content of a YAML document
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)?;
        Ok(self)
    }

    /// Replace the configuration with the content of a YAML file
    pub fn from_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)?;
        self.from_yaml(&yaml)
    }

    /// Set the bucket width
    pub fn bucket_interval(mut self, interval: Duration) -> Self {
        self.config.aggregator.bucket_interval = interval;
        self
    }

    /// Set the flush period
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.aggregator.flush_interval = interval;
        self
    }

    /// Set the shard count
    pub fn shards(mut self, shards: usize) -> Self {
        self.config.aggregator.shards = shards;
        self
    }

    /// Set the context expiry
    pub fn context_expiry(mut self, expiry: Duration) -> Self {
        self.config.aggregator.context_expiry = expiry;
        self
    }

    /// Set the tag-set cache rotation parameters
    pub fn tagset_cache(mut self, inserts_per_rotation: usize, cache_count: usize) -> Self {
        self.config.tagset.inserts_per_rotation = inserts_per_rotation;
        self.config.tagset.cache_count = cache_count;
        self
    }

    /// Set the interner capacity
    pub fn interner_size(mut self, max_size: usize) -> Self {
        self.config.interner.max_size = max_size;
        self
    }

    /// Set the log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Validate and return the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
