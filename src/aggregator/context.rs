//! Context resolution: from a sample to its context key, and back.

use crate::aggregator::tags_tlm::TagsTlm;
use crate::ckey::{ContextKey, ContextKeyGenerator};
use crate::core::{Result, TesseraError};
use crate::metrics::MetricSample;
use crate::tagset::Tags;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Identity of a metric context
#[derive(Debug, Clone)]
pub struct Context {
    /// Metric name
    pub name: Arc<str>,
    /// Host
    pub host: Arc<str>,
    /// Tags
    pub tags: Tags,
}

impl Context {
    /// True when `sample` belongs to this context. Tag sets are compared by
    /// hash and size.
    fn matches(&self, sample: &MetricSample) -> bool {
        self.name == sample.name
            && self.host == sample.host
            && self.tags.hash() == sample.tags.hash()
            && self.tags.len() == sample.tags.len()
    }
}

#[derive(Debug)]
struct Entry {
    context: Context,
    last_seen: f64,
}

/// Tracks the contexts seen by one shard.
///
/// Each tracked context holds one reference on its tag set in the
/// [`TagsTlm`]; the reference is released when the context expires.
pub struct ContextResolver {
    contexts: FxHashMap<ContextKey, Entry>,
    key_generator: ContextKeyGenerator,
    tags_tlm: TagsTlm,
}

impl ContextResolver {
    /// Create a resolver reporting tag usage into `tags_tlm`
    pub fn new(tags_tlm: TagsTlm) -> Self {
        Self {
            contexts: FxHashMap::default(),
            key_generator: ContextKeyGenerator::new(),
            tags_tlm,
        }
    }

    /// Key of the context of `sample`
    #[inline]
    pub fn key_of(&self, sample: &MetricSample) -> ContextKey {
        self.key_generator.generate(&sample.name, &sample.host, &sample.tags)
    }

    /// Register the context of `sample` as seen at `timestamp`.
    ///
    /// Fails with [`TesseraError::ContextCollision`] if the key already
    /// belongs to a different context.
    pub fn track_context(&mut self, sample: &MetricSample, timestamp: f64) -> Result<ContextKey> {
        let key = self.key_of(sample);
        self.track_keyed(key, sample, timestamp)?;
        Ok(key)
    }

    pub(crate) fn track_keyed(
        &mut self,
        key: ContextKey,
        sample: &MetricSample,
        timestamp: f64,
    ) -> Result<()> {
        if let Some(entry) = self.contexts.get_mut(&key) {
            if !entry.context.matches(sample) {
                tracing::warn!(
                    context = %key,
                    metric = %sample.name,
                    tracked = %entry.context.name,
                    "context key collision, dropping sample"
                );
                return Err(TesseraError::ContextCollision { key: key.raw() });
            }
            if timestamp > entry.last_seen {
                entry.last_seen = timestamp;
            }
            return Ok(());
        }

        self.tags_tlm.use_tags(&sample.tags);
        self.contexts.insert(
            key,
            Entry {
                context: Context {
                    name: Arc::clone(&sample.name),
                    host: Arc::clone(&sample.host),
                    tags: sample.tags.clone(),
                },
                last_seen: timestamp,
            },
        );
        Ok(())
    }

    /// Context registered under `key`
    pub fn get(&self, key: ContextKey) -> Option<&Context> {
        self.contexts.get(&key).map(|e| &e.context)
    }

    /// Forget contexts last seen before `before`, except those for which
    /// `keep` returns true. Returns the forgotten keys.
    pub fn expire_contexts<F>(&mut self, before: f64, keep: F) -> Vec<ContextKey>
    where
        F: Fn(ContextKey) -> bool,
    {
        let mut expired = Vec::new();
        let tags_tlm = &mut self.tags_tlm;
        self.contexts.retain(|key, entry| {
            if entry.last_seen >= before || keep(*key) {
                return true;
            }
            tags_tlm.release(&entry.context.tags);
            expired.push(*key);
            false
        });
        if !expired.is_empty() {
            tracing::debug!(count = expired.len(), "expired contexts");
        }
        expired
    }

    /// Let the tag tracker drop unused entries
    pub fn shrink(&mut self) {
        self.tags_tlm.shrink();
    }

    /// Tag usage tracker
    pub fn tags_tlm(&self) -> &TagsTlm {
        &self.tags_tlm
    }

    /// Number of tracked contexts
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// True when no context is tracked
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}
