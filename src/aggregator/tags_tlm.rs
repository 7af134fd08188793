//! Reference counting of the tag sets used by live contexts.
//!
//! Every context holds on to one tag set. The tracker counts, per tag-set
//! hash, how many contexts use it, and publishes statistics about the
//! population on every [`shrink`](TagsTlm::shrink).

use crate::tagset::Tags;
use crate::telemetry::{Counter, Gauge, GaugeVec, Registry};
use rustc_hash::FxHashMap;

const SUBSYSTEM: &str = "aggregator_tags_store";

// refs-count buckets, published as the `ge` label
const REFS_BUCKETS: [&str; 8] = ["1", "2", "3", "4", "8", "16", "32", "64"];

#[derive(Debug, Clone, Copy)]
struct ActiveTagset {
    tag_count: usize,
    refs: u64,
}

#[derive(Debug, Default)]
struct EntryStats {
    refs_freq: [u64; 8],
    min_size: usize,
    max_size: usize,
    sum_size: usize,
    count: usize,
}

impl EntryStats {
    fn visit(&mut self, e: &ActiveTagset) {
        let r = e.refs;
        let bucket = if r < 4 {
            (r - 1) as usize
        } else if r < 64 {
            // bit length: 4 -> 3, 63 -> 6
            (u64::BITS - r.leading_zeros()) as usize
        } else {
            7
        };
        self.refs_freq[bucket] += 1;

        let n = e.tag_count;
        if n < self.min_size || self.count == 0 {
            self.min_size = n;
        }
        self.max_size = self.max_size.max(n);
        self.sum_size += n;
        self.count += 1;
    }
}

struct Telemetry {
    hits: Counter,
    miss: Counter,
    entries: Gauge,
    max_entries: Gauge,
    min_tags: Gauge,
    max_tags: Gauge,
    sum_tags: Gauge,
    refs_count: GaugeVec,
    name: String,
}

impl Telemetry {
    fn new(name: &str, registry: &Registry) -> Self {
        let label = &["cache_instance_name"];
        let gauge = |metric: &str, help: &str| {
            registry.gauge(SUBSYSTEM, metric, label, help).with_values(&[name])
        };

        Self {
            hits: registry
                .counter(SUBSYSTEM, "hits_total", label, "Times the tags were already tracked")
                .with_values(&[name]),
            miss: registry
                .counter(SUBSYSTEM, "miss_total", label, "Times the tags were not tracked yet")
                .with_values(&[name]),
            entries: gauge("entries", "Tracked tag sets"),
            max_entries: gauge("max_entries", "Maximum tracked tag sets since the last shrink"),
            min_tags: gauge("tagset_min_tags", "Smallest number of tags in a tracked tag set"),
            max_tags: gauge("tagset_max_tags", "Largest number of tags in a tracked tag set"),
            sum_tags: gauge("tagset_sum_tags", "Tags across all tracked tag sets"),
            refs_count: registry.gauge(
                SUBSYSTEM,
                "tagset_refs_count",
                &["cache_instance_name", "ge"],
                "Distribution of the reference counts of tracked tag sets",
            ),
            name: name.to_string(),
        }
    }
}

/// Reference counts of tag sets by hash. A disabled tracker ignores every
/// call.
pub struct TagsTlm {
    tags_by_key: FxHashMap<u64, ActiveTagset>,
    // capacity the map was last sized for
    cap: usize,
    enabled: bool,
    telemetry: Telemetry,
}

impl TagsTlm {
    /// Create a tracker publishing under `cache_instance_name = name`
    pub fn new(enabled: bool, name: &str, registry: &Registry) -> Self {
        Self {
            tags_by_key: FxHashMap::default(),
            cap: 0,
            enabled,
            telemetry: Telemetry::new(name, registry),
        }
    }

    /// Record one more user of `tags`. Must be balanced by a [`release`](Self::release).
    pub fn use_tags(&mut self, tags: &Tags) {
        if !self.enabled {
            return;
        }

        match self.tags_by_key.get_mut(&tags.hash()) {
            Some(entry) => {
                entry.refs += 1;
                self.telemetry.hits.inc();
            },
            None => {
                self.tags_by_key.insert(
                    tags.hash(),
                    ActiveTagset {
                        tag_count: tags.len(),
                        refs: 1,
                    },
                );
                self.cap += 1;
                self.telemetry.miss.inc();
            },
        }
    }

    /// Drop one user of `tags`. Unknown tag sets and counts already at zero
    /// are left alone.
    pub fn release(&mut self, tags: &Tags) {
        match self.tags_by_key.get_mut(&tags.hash()) {
            Some(entry) if entry.refs > 0 => entry.refs -= 1,
            Some(_) => tracing::debug!(hash = tags.hash(), "tag set released more often than used"),
            None if self.enabled => {
                tracing::debug!(hash = tags.hash(), "released tag set is not tracked")
            },
            None => {},
        }
    }

    /// Forget unused tag sets, give memory back when the map is less than
    /// half full, and publish statistics.
    pub fn shrink(&mut self) {
        let mut stats = EntryStats::default();
        self.tags_by_key.retain(|_, entry| {
            if entry.refs == 0 {
                return false;
            }
            stats.visit(entry);
            true
        });

        if self.tags_by_key.len() < self.cap / 2 {
            let mut resized =
                FxHashMap::with_capacity_and_hasher(self.tags_by_key.len(), Default::default());
            resized.extend(self.tags_by_key.drain());
            self.cap = resized.len();
            self.tags_by_key = resized;
        }

        self.update_telemetry(&stats);
    }

    fn update_telemetry(&self, stats: &EntryStats) {
        let t = &self.telemetry;
        t.max_entries.set(self.cap as f64);
        t.entries.set(self.tags_by_key.len() as f64);

        for (freq, ge) in stats.refs_freq.iter().zip(REFS_BUCKETS) {
            t.refs_count.set(*freq as f64, &[t.name.as_str(), ge]);
        }

        t.min_tags.set(stats.min_size as f64);
        t.max_tags.set(stats.max_size as f64);
        t.sum_tags.set(stats.sum_size as f64);
    }

    /// Number of tracked tag sets
    pub fn len(&self) -> usize {
        self.tags_by_key.len()
    }

    /// True when nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.tags_by_key.is_empty()
    }

    /// Capacity the map was last sized for
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Reference count of the tag set with hash `hash`
    pub fn refs(&self, hash: u64) -> Option<u64> {
        self.tags_by_key.get(&hash).map(|e| e.refs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store() {
        let mut c = TagsTlm::new(true, "test", &Registry::new());

        let t1 = Tags::new(["1"]);
        let h1 = t1.hash();
        let t2 = Tags::new(["2"]);
        let h2 = t2.hash();

        c.use_tags(&t1);
        assert_eq!(c.len(), 1);
        assert_eq!(c.cap(), 1);
        assert_eq!(c.refs(h1), Some(1));

        c.use_tags(&t1);
        assert_eq!(c.len(), 1);
        assert_eq!(c.cap(), 1);
        assert_eq!(c.refs(h1), Some(2));

        c.use_tags(&t2);
        assert_eq!(c.len(), 2);
        assert_eq!(c.cap(), 2);
        assert_eq!(c.refs(h1), Some(2));
        assert_eq!(c.refs(h2), Some(1));

        c.use_tags(&t2);
        assert_eq!(c.len(), 2);
        assert_eq!(c.cap(), 2);
        assert_eq!(c.refs(h1), Some(2));
        assert_eq!(c.refs(h2), Some(2));

        c.release(&t1);
        assert_eq!(c.len(), 2);
        assert_eq!(c.cap(), 2);
        assert_eq!(c.refs(h1), Some(1));
        assert_eq!(c.refs(h2), Some(2));

        c.shrink();
        assert_eq!(c.len(), 2);
        assert_eq!(c.cap(), 2);

        c.release(&t2);
        assert_eq!(c.len(), 2);
        assert_eq!(c.cap(), 2);
        assert_eq!(c.refs(h1), Some(1));
        assert_eq!(c.refs(h2), Some(1));

        c.release(&t1);
        assert_eq!(c.len(), 2);
        assert_eq!(c.cap(), 2);
        assert_eq!(c.refs(h1), Some(0));
        assert_eq!(c.refs(h2), Some(1));

        c.shrink();
        assert_eq!(c.len(), 1);
        assert_eq!(c.cap(), 2);
        assert_eq!(c.refs(h2), Some(1));

        c.release(&t2);
        assert_eq!(c.len(), 1);
        assert_eq!(c.cap(), 2);
        assert_eq!(c.refs(h2), Some(0));

        c.shrink();
        assert_eq!(c.len(), 0);
        assert_eq!(c.cap(), 0);
    }

    #[test]
    fn test_store_disabled() {
        let mut c = TagsTlm::new(false, "test", &Registry::new());

        let t1 = Tags::new(["1"]);
        let t2 = Tags::new(["2"]);

        c.use_tags(&t1);
        assert_eq!((c.len(), c.cap()), (0, 0));
        c.use_tags(&t1);
        assert_eq!((c.len(), c.cap()), (0, 0));
        c.use_tags(&t2);
        assert_eq!((c.len(), c.cap()), (0, 0));
        c.release(&t1);
        assert_eq!((c.len(), c.cap()), (0, 0));
        c.release(&t2);
        assert_eq!((c.len(), c.cap()), (0, 0));
        c.shrink();
        assert_eq!((c.len(), c.cap()), (0, 0));
    }

    #[test]
    fn test_release_never_goes_negative() {
        let mut c = TagsTlm::new(true, "test", &Registry::new());
        let t1 = Tags::new(["1"]);

        c.release(&t1);
        assert_eq!(c.refs(t1.hash()), None);

        c.use_tags(&t1);
        c.release(&t1);
        c.release(&t1);
        assert_eq!(c.refs(t1.hash()), Some(0));
    }

    #[test]
    fn test_shrink_publishes_telemetry() {
        let registry = Registry::new();
        let mut c = TagsTlm::new(true, "test", &registry);

        let small = Tags::new(["a"]);
        let large = Tags::new(["a", "b", "c"]);
        for _ in 0..5 {
            c.use_tags(&small);
        }
        c.use_tags(&large);
        c.shrink();

        let value = |name: &str| registry.value(&format!("{}__{}", SUBSYSTEM, name), &["test"]);
        assert_eq!(value("entries"), Some(2.0));
        assert_eq!(value("max_entries"), Some(2.0));
        assert_eq!(value("tagset_min_tags"), Some(1.0));
        assert_eq!(value("tagset_max_tags"), Some(3.0));
        assert_eq!(value("tagset_sum_tags"), Some(4.0));
        assert_eq!(value("hits_total"), Some(4.0));
        assert_eq!(value("miss_total"), Some(2.0));

        let refs = |ge: &str| {
            registry.value("aggregator_tags_store__tagset_refs_count", &["test", ge])
        };
        assert_eq!(refs("1"), Some(1.0));
        // five references land in the [4, 8) bucket
        assert_eq!(refs("4"), Some(1.0));
        assert_eq!(refs("64"), Some(0.0));
    }

    #[test]
    fn test_refs_buckets() {
        let bucket_of = |refs: u64| {
            let mut stats = EntryStats::default();
            stats.visit(&ActiveTagset { tag_count: 1, refs });
            stats.refs_freq.iter().position(|f| *f == 1)
        };
        assert_eq!(bucket_of(1), Some(0));
        assert_eq!(bucket_of(3), Some(2));
        assert_eq!(bucket_of(4), Some(3));
        assert_eq!(bucket_of(7), Some(3));
        assert_eq!(bucket_of(8), Some(4));
        assert_eq!(bucket_of(63), Some(6));
        assert_eq!(bucket_of(64), Some(7));
        assert_eq!(bucket_of(10_000), Some(7));
    }
}
