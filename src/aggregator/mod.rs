//! Aggregation of samples by context and time bucket.
//!
//! A [`TimeSampler`] owns everything one shard needs: the context resolver,
//! the tag usage tracker and the pending buckets. [`ShardedAggregator`]
//! spreads contexts over several samplers, and the [`Flusher`] drives
//! periodic flushes on a tokio runtime.

pub mod context;
pub mod flusher;
pub mod sharded;
pub mod tags_tlm;
pub mod time_sampler;

pub use context::{Context, ContextResolver};
pub use flusher::Flusher;
pub use sharded::ShardedAggregator;
pub use tags_tlm::TagsTlm;
pub use time_sampler::{FlushReport, TimeSampler};
