//! Caching tag-set factory.
//!
//! Equal tag sets built through the same factory share one allocation. The
//! factory keeps one generational cache per purpose: tag sets by their own
//! hash, and unions by the pair of input hashes.

use crate::core::string_intern::StringInterner;
use crate::core::{Result, TesseraError};
use crate::tagset::cache::{CacheTelemetry, TagsCache};
use crate::tagset::hash::{hash_bytes, hash_tags, union_key};
use crate::tagset::tags::{Tags, TagsBuilder};
use crate::telemetry::{Counter, Registry};
use rustc_hash::FxHashSet;

/// Purpose-specific caches inside a factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheId {
    /// Tag sets keyed by their own hash
    ByTagsetHash,
    /// Unions keyed by the hashes of both operands
    Union,
}

impl CacheId {
    /// Stable name used in telemetry
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheId::ByTagsetHash => "byTagsetHashCache",
            CacheId::Union => "unionCache",
        }
    }
}

/// Telemetry for a whole factory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryTelemetry {
    /// Name given at construction
    pub factory_name: String,
    /// Telemetry per cache
    pub caches: Vec<(CacheId, CacheTelemetry)>,
    /// Hash matches whose members differed
    pub collisions: u64,
}

/// Tag-set factory backed by generational caches. Not synchronized.
pub struct CachingFactory {
    name: String,
    by_hash: TagsCache<Tags>,
    union: TagsCache<Tags>,
    collisions: Counter,
}

impl CachingFactory {
    /// Create a factory without a registry of its own
    pub fn new(inserts_per_rotation: usize, cache_count: usize) -> Self {
        Self::with_telemetry(inserts_per_rotation, cache_count, "default", &Registry::new())
    }

    /// Create a named factory reporting into `registry`
    pub fn with_telemetry(
        inserts_per_rotation: usize,
        cache_count: usize,
        name: &str,
        registry: &Registry,
    ) -> Self {
        let collisions = registry
            .counter(
                "tagset_factory",
                "hash_collisions",
                &["cache_instance_name"],
                "Tag sets sharing a hash with a different cached tag set",
            )
            .with_values(&[name]);

        Self {
            name: name.to_string(),
            by_hash: TagsCache::new(inserts_per_rotation, cache_count),
            union: TagsCache::new(inserts_per_rotation, cache_count),
            collisions,
        }
    }

    /// Name of this factory
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build (or fetch) the tag set with the given members
    pub fn new_tags<T: AsRef<str>>(&mut self, tags: &[T]) -> Tags {
        let (key, _) = hash_tags(tags.iter().map(|t| t.as_ref()));
        let cached = self.by_hash.get_or_create(key, || Tags::new(tags));
        if cached.same_members(tags) {
            return cached;
        }
        self.collision(key);
        Tags::new(tags)
    }

    /// Start a builder; finish it with [`freeze`](Self::freeze)
    pub fn new_builder(&self, capacity: usize) -> TagsBuilder {
        TagsBuilder::with_capacity(capacity)
    }

    /// Finish a builder, sharing the result with equal cached tag sets
    pub fn freeze(&mut self, builder: TagsBuilder) -> Tags {
        let key = builder.hash();
        if let Some(cached) = self.by_hash.search(key) {
            if builder.matches(&cached) {
                return cached;
            }
            self.collision(key);
            return builder.build();
        }
        let tags = builder.build();
        self.by_hash.insert(key, tags.clone());
        tags
    }

    /// Union of two tag sets. Repeated unions of the same pair are answered
    /// from the union cache without touching the members again.
    ///
    /// The union cache trusts its pair key; a collision there would return a
    /// wrong union. With 64-bit keys this is accepted.
    pub fn union(&mut self, a: &Tags, b: &Tags) -> Tags {
        let key = union_key(a.hash(), b.hash());
        if let Some(cached) = self.union.search(key) {
            return cached;
        }

        let mut builder = TagsBuilder::with_capacity(a.len() + b.len());
        builder.add_tags(a);
        builder.add_tags(b);
        let tags = self.freeze(builder);

        self.union.insert(key, tags.clone());
        tags
    }

    /// Parse a comma separated tag list, interning each tag.
    ///
    /// Empty segments and invalid UTF-8 are rejected; failures are not cached.
    pub fn parse_tags(&mut self, raw: &[u8], interner: &mut StringInterner) -> Result<Tags> {
        if raw.is_empty() {
            return Ok(self.new_tags::<&str>(&[]));
        }

        let mut seen = FxHashSet::default();
        let mut key = 0u64;
        for segment in raw.split(|b| *b == b',') {
            if segment.is_empty() {
                return Err(TesseraError::invalid_tags(format!(
                    "empty tag in '{}'",
                    String::from_utf8_lossy(raw)
                )));
            }
            let h = hash_bytes(segment);
            if seen.insert(h) {
                key ^= h;
            }
        }

        let cached = self
            .by_hash
            .get_or_try_create(key, || build_parsed(raw, interner))?;

        let same = cached.len() == seen.len()
            && raw
                .split(|b| *b == b',')
                .all(|s| std::str::from_utf8(s).map_or(false, |s| cached.contains(s)));
        if same {
            return Ok(cached);
        }
        self.collision(key);
        build_parsed(raw, interner)
    }

    fn collision(&self, key: u64) {
        tracing::debug!(key, factory = %self.name, "tag set hash collision");
        self.collisions.inc();
    }

    /// Current telemetry for every cache
    pub fn telemetry(&self) -> FactoryTelemetry {
        FactoryTelemetry {
            factory_name: self.name.clone(),
            caches: vec![
                (CacheId::ByTagsetHash, self.by_hash.telemetry()),
                (CacheId::Union, self.union.telemetry()),
            ],
            collisions: self.collisions.get(),
        }
    }

    /// Publish cache telemetry as gauges
    pub fn report_telemetry(&self, registry: &Registry) {
        let labels = &["cache_instance_name", "cache", "generation"];
        let inserts = registry.gauge("tagset_factory", "inserts", labels, "Tag sets per generation");
        let searches =
            registry.gauge("tagset_factory", "searches", labels, "Searches per generation");
        let hits = registry.gauge(
            "tagset_factory",
            "hits",
            &["cache_instance_name", "cache"],
            "Lookups answered from the cache",
        );
        let misses = registry.gauge(
            "tagset_factory",
            "misses",
            &["cache_instance_name", "cache"],
            "Lookups that created a new tag set",
        );

        for (id, tlm) in self.telemetry().caches {
            for (generation, map) in tlm.maps.iter().enumerate() {
                let generation = generation.to_string();
                let values = [self.name.as_str(), id.as_str(), generation.as_str()];
                inserts.set(map.inserts as f64, &values);
                searches.set(map.searches as f64, &values);
            }
            hits.set(tlm.hits as f64, &[self.name.as_str(), id.as_str()]);
            misses.set(tlm.misses as f64, &[self.name.as_str(), id.as_str()]);
        }
    }
}

fn build_parsed(raw: &[u8], interner: &mut StringInterner) -> Result<Tags> {
    let mut builder = TagsBuilder::with_capacity(raw.iter().filter(|b| **b == b',').count() + 1);
    for segment in raw.split(|b| *b == b',') {
        if std::str::from_utf8(segment).is_err() {
            return Err(TesseraError::invalid_tags(format!(
                "tag '{}' is not valid UTF-8",
                String::from_utf8_lossy(segment)
            )));
        }
        let tag = interner.load_or_store_tag(segment);
        builder.add_hashed(tag.data, tag.hash);
    }
    Ok(builder.build())
}
