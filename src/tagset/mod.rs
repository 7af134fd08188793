//! Tag sets, their hashing and the caches that deduplicate them.
//!
//! A [`Tags`] value is immutable and cheap to clone. The [`CachingFactory`]
//! makes sure that equal tag sets built through it share one allocation, using
//! the rotating [`TagsCache`] to keep memory bounded.

pub mod cache;
pub mod factory;
pub mod hash;
pub mod tags;

pub use cache::{CacheMapTelemetry, CacheTelemetry, TagsCache};
pub use factory::{CacheId, CachingFactory, FactoryTelemetry};
pub use tags::{Tags, TagsBuilder};
