//! Immutable tag sets.

use crate::tagset::hash::{combine_hashes, hash_str};
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::{Arc, OnceLock};

struct TagsInner {
    tags: Box<[Arc<str>]>,
    hashes: Box<[u64]>,
    hash: u64,
}

/// An immutable, duplicate-free set of tags.
///
/// Cloning is cheap: all clones share the same allocation. Member order is
/// insertion order and carries no meaning; equality and hashing ignore it.
#[derive(Clone)]
pub struct Tags {
    inner: Arc<TagsInner>,
}

impl Tags {
    /// Build a tag set from strings, dropping duplicates.
    ///
    /// Most callers should go through
    /// [`CachingFactory`](crate::tagset::CachingFactory) instead, which shares
    /// instances between equal tag sets.
    pub fn new<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut builder = TagsBuilder::with_capacity(0);
        for tag in tags {
            builder.add(tag.as_ref());
        }
        builder.build()
    }

    /// The empty tag set
    pub fn empty() -> Self {
        static EMPTY: OnceLock<Tags> = OnceLock::new();
        EMPTY.get_or_init(|| Self::from_parts(Vec::new(), Vec::new())).clone()
    }

    pub(crate) fn from_parts(tags: Vec<Arc<str>>, hashes: Vec<u64>) -> Self {
        debug_assert_eq!(tags.len(), hashes.len());
        let hash = combine_hashes(&hashes);
        Self {
            inner: Arc::new(TagsInner {
                tags: tags.into_boxed_slice(),
                hashes: hashes.into_boxed_slice(),
                hash,
            }),
        }
    }

    /// Order-insensitive hash of the members
    #[inline]
    pub fn hash(&self) -> u64 {
        self.inner.hash
    }

    /// Number of tags
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.tags.len()
    }

    /// True for the empty tag set
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.tags.is_empty()
    }

    /// Iterate over the tags
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.inner.tags.iter().map(|t| t.as_ref())
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&Arc<str>, u64)> {
        self.inner.tags.iter().zip(self.inner.hashes.iter().copied())
    }

    /// True when the tag is a member
    pub fn contains(&self, tag: &str) -> bool {
        let h = hash_str(tag);
        self.entries().any(|(t, th)| th == h && t.as_ref() == tag)
    }

    /// Members in lexicographic order
    pub fn sorted(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.iter().collect();
        out.sort_unstable();
        out
    }

    /// True when both handles point at the same allocation
    #[inline]
    pub fn ptr_eq(&self, other: &Tags) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// True when `tags` (deduplicated) has exactly the members of this set
    pub(crate) fn same_members<T: AsRef<str>>(&self, tags: &[T]) -> bool {
        let mut distinct = FxHashSet::default();
        for tag in tags {
            let tag = tag.as_ref();
            if !self.contains(tag) {
                return false;
            }
            distinct.insert(tag);
        }
        distinct.len() == self.len()
    }
}

impl PartialEq for Tags {
    fn eq(&self, other: &Self) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        self.hash() == other.hash() && self.len() == other.len() && self.sorted() == other.sorted()
    }
}

impl Eq for Tags {}

impl Default for Tags {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, tag) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(tag)?;
        }
        Ok(())
    }
}

/// Accumulates tags for a new [`Tags`], dropping duplicates as they are added.
pub struct TagsBuilder {
    tags: Vec<Arc<str>>,
    hashes: Vec<u64>,
    seen: FxHashSet<u64>,
}

impl TagsBuilder {
    /// Create a builder with room for `capacity` tags
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tags: Vec::with_capacity(capacity),
            hashes: Vec::with_capacity(capacity),
            seen: FxHashSet::default(),
        }
    }

    /// Add a tag
    pub fn add(&mut self, tag: &str) {
        let h = hash_str(tag);
        if !self.contains_tag(tag, h) {
            self.push(Arc::from(tag), h);
        }
    }

    /// Add an already-shared tag whose hash is known (e.g. from the interner)
    pub fn add_hashed(&mut self, tag: Arc<str>, hash: u64) {
        debug_assert_eq!(hash, hash_str(&tag));
        if !self.contains_tag(&tag, hash) {
            self.push(tag, hash);
        }
    }

    /// Add every tag of an existing set
    pub fn add_tags(&mut self, tags: &Tags) {
        for (tag, h) in tags.entries() {
            if !self.contains_tag(tag, h) {
                self.push(Arc::clone(tag), h);
            }
        }
    }

    /// A hash match alone is not a duplicate: distinct tags sharing a hash
    /// are both kept.
    fn contains_tag(&self, tag: &str, hash: u64) -> bool {
        self.seen.contains(&hash)
            && self
                .hashes
                .iter()
                .zip(&self.tags)
                .any(|(h, t)| *h == hash && t.as_ref() == tag)
    }

    fn push(&mut self, tag: Arc<str>, hash: u64) {
        self.seen.insert(hash);
        self.tags.push(tag);
        self.hashes.push(hash);
    }

    /// Hash the finished set would have
    pub fn hash(&self) -> u64 {
        combine_hashes(&self.hashes)
    }

    /// Number of distinct tags added so far
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True if nothing has been added
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub(crate) fn matches(&self, tags: &Tags) -> bool {
        self.len() == tags.len()
            && tags
                .entries()
                .all(|(t, h)| self.seen.contains(&h) && self.tags.iter().any(|x| x == t))
    }

    /// Finish without going through a cache
    pub fn build(self) -> Tags {
        Tags::from_parts(self.tags, self.hashes)
    }
}
