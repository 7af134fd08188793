//! Metric samples, the per-context accumulators and their flushing.
//!
//! Samples are folded into one accumulator per context ([`ContextMetrics`]).
//! Flushing turns accumulators into [`Serie`]s, either for one store or for a
//! set of time buckets at once ([`flush_and_clear`]). Flushed series can be
//! streamed to a consumer through [`serie_buffer`].

pub mod context_metrics;
pub mod count;
pub mod counter;
pub mod gauge;
pub mod histogram;
pub mod historate;
pub mod metric;
pub mod monotonic_count;
pub mod rate;
pub mod serie;
pub mod serie_buffer;
pub mod set;
pub mod timestamped;
pub mod types;

pub use context_metrics::{AddSampleTelemetry, ContextFlush, ContextMetrics};
pub use histogram::{HistogramSettings, Percentile};
pub use metric::{BuildContext, Constructor, Metric, MetricFactory};
pub use serie::{Points, Serie};
pub use serie_buffer::{serie_buffer, OverflowPolicy, SerieReceiver, SerieSender, SerieSink};
pub use timestamped::{flush_and_clear, MergeReport, TimestampedContextMetrics};
pub use types::{ApiMetricType, MetricSample, MetricType, Point};
