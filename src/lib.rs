//! Tessera - metrics aggregation and context deduplication.
//!
//! Tessera is the aggregation core of a telemetry agent. It takes a stream
//! of metric samples (name, tags, host, value, timestamp), resolves each one
//! to a deduplicated context, folds it into a per-context accumulator and
//! periodically flushes the accumulators as series.
//!
//! # Architecture
//!
//! - `tagset`: immutable tag sets and the generational caches sharing them
//! - `ckey`: context keys
//! - `metrics`: samples, accumulators, per-bucket stores and their flushing
//! - `aggregator`: context tracking, time bucketing, shards and the flusher
//! - `telemetry`: the internal metrics registry every component reports to
//! - `core`: configuration, errors, logging and string interning
//!
//! # Example
//!
//! ```no_run
//! use tessera_lib::aggregator::ShardedAggregator;
//! use tessera_lib::metrics::{MetricSample, MetricType, Serie};
//! use tessera_lib::telemetry::Registry;
//! use tessera_lib::Config;
//!
//! fn main() -> tessera_lib::Result<()> {
//!     let config = Config::new()?;
//!     let registry = Registry::new();
//!     let aggregator = ShardedAggregator::new(&config.aggregator, &registry)?;
//!
//!     aggregator.sample(&MetricSample::new("requests", 1.0, MetricType::Counter).at(1000.0))?;
//!
//!     let mut series: Vec<Serie> = Vec::new();
//!     aggregator.flush(1010.0, &mut series);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod aggregator;
pub mod ckey;
pub mod core;
pub mod metrics;
pub mod tagset;
pub mod telemetry;

// Re-export core types for convenience
pub use crate::core::{Config, Result, TesseraError};
