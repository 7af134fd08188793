//! Fixed-capacity string interning for the ingestion hot path.
//!
//! Metric names and tags repeat constantly. The interner hands back one shared
//! `Arc<str>` per distinct byte sequence so repeated samples do not allocate.
//!
//! The table is open-addressed with linear probing. Each slot carries a 16-bit
//! probe tag (never zero, zero marks a free slot) and the full 64-bit hash is
//! checked before the bytes are compared. The table is sized to the next power
//! of two above `max_size + max_size / 8`. Once `max_size` entries are stored
//! the next insert clears the whole table instead of evicting entries one by
//! one, and `interner__resets` is incremented.

use crate::tagset::hash::hash_bytes;
use crate::telemetry::{Counter, Registry};
use std::sync::Arc;

const DEFAULT_MAX_SIZE: usize = 500;

/// An interned string together with its hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternedTag {
    /// Shared string
    pub data: Arc<str>,
    /// `hash_bytes` of the original bytes
    pub hash: u64,
}

struct Entry {
    hash: u64,
    raw: Box<[u8]>,
    data: Arc<str>,
}

/// Open-addressed string interner. One instance per worker; not synchronized.
pub struct StringInterner {
    entries: Vec<Option<Entry>>,
    probe_tags: Vec<u16>,
    mask: u64,
    used: usize,
    max_size: usize,
    resets: Counter,
}

impl StringInterner {
    /// Create an interner storing up to `max_size` strings (500 when zero)
    pub fn new(max_size: usize, registry: &Registry) -> Self {
        let max_size = if max_size == 0 { DEFAULT_MAX_SIZE } else { max_size };
        let size = (max_size + max_size / 8 + 1).next_power_of_two();
        let resets = registry
            .counter("interner", "resets", &[], "Amount of resets of the string interner")
            .with_values(&[]);

        Self {
            entries: (0..size).map(|_| None).collect(),
            probe_tags: vec![0; size],
            mask: (size - 1) as u64,
            used: 0,
            max_size,
            resets,
        }
    }

    /// Return the shared string for `key`, adding it if needed
    #[inline]
    pub fn load_or_store(&mut self, key: &[u8]) -> Arc<str> {
        let pos = self.slot(key);
        match &self.entries[pos] {
            Some(e) => Arc::clone(&e.data),
            None => unreachable!("slot returned an empty position"),
        }
    }

    /// Like [`load_or_store`](Self::load_or_store), also returning the hash
    pub fn load_or_store_tag(&mut self, key: &[u8]) -> InternedTag {
        let pos = self.slot(key);
        match &self.entries[pos] {
            Some(e) => InternedTag {
                data: Arc::clone(&e.data),
                hash: e.hash,
            },
            None => unreachable!("slot returned an empty position"),
        }
    }

    /// Find or fill the slot holding `key`
    fn slot(&mut self, key: &[u8]) -> usize {
        let h = hash_bytes(key);
        let probe_tag = 0x8000 | ((h as u16) >> 1);
        let mut pos = (h & self.mask) as usize;
        let begin = pos;

        loop {
            if self.probe_tags[pos] == 0 {
                if self.used >= self.max_size {
                    self.reset();
                    pos = (h & self.mask) as usize;
                }
                self.probe_tags[pos] = probe_tag;
                self.entries[pos] = Some(Entry {
                    hash: h,
                    raw: key.into(),
                    data: Arc::from(String::from_utf8_lossy(key)),
                });
                self.used += 1;
                return pos;
            }
            if self.probe_tags[pos] == probe_tag {
                if let Some(e) = &self.entries[pos] {
                    if e.hash == h && *e.raw == *key {
                        return pos;
                    }
                }
            }
            pos = (pos + 1) & self.mask as usize;
            if pos == begin {
                panic!("interner wrapped around, insufficient capacity");
            }
        }
    }

    fn reset(&mut self) {
        tracing::debug!("clearing the string interner cache");
        self.resets.inc();
        self.probe_tags.fill(0);
        self.entries.iter_mut().for_each(|e| *e = None);
        self.used = 0;
    }

    /// Number of strings currently stored
    #[inline]
    pub fn len(&self) -> usize {
        self.used
    }

    /// True when nothing is stored
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Number of slots in the table
    pub fn capacity(&self) -> usize {
        self.probe_tags.len()
    }

    /// Number of times the table has been cleared
    pub fn resets(&self) -> u64 {
        self.resets.get()
    }
}
