//! Rotating, generational cache keyed by precomputed hashes.
//!
//! The cache holds `cache_count` maps. Generation 0 receives every insert;
//! after `inserts_per_rotation` inserts all generations shift down by one and
//! the oldest is dropped wholesale. A hit in an older generation re-inserts
//! the value into generation 0, so anything in active use survives rotation.
//!
//! Not synchronized: every operation takes `&mut self`.

use rustc_hash::FxHashMap;

/// Per-generation telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheMapTelemetry {
    /// Entries in this generation. Includes promotions from older generations
    /// as well as freshly created values.
    pub inserts: usize,
    /// Searches performed while this generation was the current one.
    pub searches: usize,
}

/// Telemetry for one cache
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheTelemetry {
    /// One entry per generation, newest first
    pub maps: Vec<CacheMapTelemetry>,
    /// Lookups answered from any generation
    pub hits: u64,
    /// Lookups that had to create the value
    pub misses: u64,
}

/// Generational cache of `V` keyed by `u64`
pub struct TagsCache<V> {
    inserts_per_rotation: usize,
    inserts: usize,
    searches: usize,
    // Index 0 is not kept up to date; the live value is `searches`.
    search_history: Vec<usize>,
    maps: Vec<FxHashMap<u64, V>>,
    hits: u64,
    misses: u64,
}

impl<V: Clone> TagsCache<V> {
    /// Create a cache with `cache_count` generations (at least one)
    pub fn new(inserts_per_rotation: usize, cache_count: usize) -> Self {
        let cache_count = cache_count.max(1);
        Self {
            inserts_per_rotation: inserts_per_rotation.max(1),
            inserts: 0,
            searches: 0,
            search_history: vec![0; cache_count],
            maps: (0..cache_count).map(|_| FxHashMap::default()).collect(),
            hits: 0,
            misses: 0,
        }
    }

    /// Look up `key`, calling `miss` to create the value if it is absent
    pub fn get_or_create<F>(&mut self, key: u64, miss: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(v) = self.search(key) {
            return v;
        }
        let v = miss();
        self.insert(key, v.clone());
        v
    }

    /// Like [`get_or_create`](Self::get_or_create) for fallible creation.
    /// Errors are returned to the caller and nothing is cached.
    pub fn get_or_try_create<F, E>(&mut self, key: u64, miss: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(v) = self.search(key) {
            return Ok(v);
        }
        let v = miss()?;
        self.insert(key, v.clone());
        Ok(v)
    }

    /// Search every generation, promoting hits from older ones
    pub fn search(&mut self, key: u64) -> Option<V> {
        self.searches += 1;
        if let Some(v) = self.maps[0].get(&key) {
            self.hits += 1;
            return Some(v.clone());
        }

        let found = self.maps[1..].iter().find_map(|m| m.get(&key).cloned());
        match found {
            Some(v) => {
                self.hits += 1;
                self.insert(key, v.clone());
                Some(v)
            },
            None => {
                self.misses += 1;
                None
            },
        }
    }

    /// Insert into generation 0, rotating when the generation is full
    pub fn insert(&mut self, key: u64, value: V) {
        self.maps[0].insert(key, value);
        self.inserts += 1;

        if self.inserts >= self.inserts_per_rotation {
            self.rotate();
        }
    }

    fn rotate(&mut self) {
        let cache_count = self.maps.len();
        // size the new generation like the one about to be discarded
        let last_len = self.maps[cache_count - 1].len();

        self.search_history[0] = self.searches;
        self.searches = 0;
        self.inserts = 0;

        self.maps.rotate_right(1);
        self.search_history.rotate_right(1);
        self.maps[0] = FxHashMap::with_capacity_and_hasher(last_len, Default::default());
        self.search_history[0] = 0;
    }

    /// Number of generations
    pub fn generations(&self) -> usize {
        self.maps.len()
    }

    /// Total entries across generations (a key may be counted more than once)
    pub fn len(&self) -> usize {
        self.maps.iter().map(|m| m.len()).sum()
    }

    /// True when every generation is empty
    pub fn is_empty(&self) -> bool {
        self.maps.iter().all(|m| m.is_empty())
    }

    /// Which generation currently holds `key`, newest first
    pub fn generation_of(&self, key: u64) -> Option<usize> {
        self.maps.iter().position(|m| m.contains_key(&key))
    }

    /// Current telemetry
    pub fn telemetry(&self) -> CacheTelemetry {
        let maps = self
            .maps
            .iter()
            .enumerate()
            .map(|(i, m)| CacheMapTelemetry {
                inserts: m.len(),
                searches: if i == 0 { self.searches } else { self.search_history[i] },
            })
            .collect();
        CacheTelemetry {
            maps,
            hits: self.hits,
            misses: self.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_caches() {
        let mut cache: TagsCache<u32> = TagsCache::new(10, 2);
        let mut calls = 0;

        let v = cache.get_or_create(1, || {
            calls += 1;
            7
        });
        assert_eq!(v, 7);
        let v = cache.get_or_create(1, || {
            calls += 1;
            8
        });
        assert_eq!(v, 7);
        assert_eq!(calls, 1);

        let tlm = cache.telemetry();
        assert_eq!(tlm.hits, 1);
        assert_eq!(tlm.misses, 1);
    }

    #[test]
    fn test_rotation_and_promotion() {
        let mut cache: TagsCache<u64> = TagsCache::new(3, 3);
        cache.get_or_create(100, || 100);
        assert_eq!(cache.generation_of(100), Some(0));

        for k in 0..3 {
            cache.get_or_create(k, || k);
        }
        // 4 inserts with a rotation every 3: key 100 is now one generation back
        assert_eq!(cache.generation_of(100), Some(1));

        let v = cache.get_or_create(100, || panic!("must be found in an older generation"));
        assert_eq!(v, 100);
        assert_eq!(cache.generation_of(100), Some(0));
    }

    #[test]
    fn test_oldest_generation_is_dropped() {
        let mut cache: TagsCache<u64> = TagsCache::new(1, 2);
        cache.insert(1, 1);
        assert_eq!(cache.generation_of(1), Some(1));

        cache.insert(2, 2);
        assert_eq!(cache.generation_of(1), None);
        assert_eq!(cache.generation_of(2), Some(1));
        assert_eq!(cache.generations(), 2);
    }

    #[test]
    fn test_try_create_does_not_cache_errors() {
        let mut cache: TagsCache<u64> = TagsCache::new(10, 1);
        let r: Result<u64, &str> = cache.get_or_try_create(5, || Err("nope"));
        assert!(r.is_err());
        assert!(cache.is_empty());

        let r: Result<u64, &str> = cache.get_or_try_create(5, || Ok(5));
        assert_eq!(r, Ok(5));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_telemetry_shape() {
        let mut cache: TagsCache<u64> = TagsCache::new(2, 2);
        cache.get_or_create(1, || 1);
        cache.get_or_create(1, || 1);
        cache.get_or_create(2, || 2); // rotates

        let tlm = cache.telemetry();
        assert_eq!(tlm.maps.len(), 2);
        assert_eq!(tlm.maps[0], CacheMapTelemetry { inserts: 0, searches: 0 });
        assert_eq!(tlm.maps[1], CacheMapTelemetry { inserts: 2, searches: 3 });
    }
}
