//! Context keys.
//!
//! A context is a metric name, a host and a tag set. Its key is computed once
//! per sample and used everywhere a context has to be looked up.

use crate::tagset::hash::hash_context;
use crate::tagset::Tags;
use std::fmt;

/// 64-bit identifier of a metric context.
///
/// Two distinct contexts can in principle hash to the same key. The
/// [`ContextResolver`](crate::aggregator::ContextResolver) checks the name,
/// host and tag set of every sample against the context already registered
/// under its key, and rejects the sample on a mismatch rather than merging
/// the two contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContextKey(u64);

impl ContextKey {
    /// Wrap a raw key
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Computes context keys
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextKeyGenerator;

impl ContextKeyGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self
    }

    /// Key of the context made of `name`, `host` and `tags`
    #[inline]
    pub fn generate(&self, name: &str, host: &str, tags: &Tags) -> ContextKey {
        ContextKey(hash_context(name, host, tags.hash()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_tag_order() {
        let gen = ContextKeyGenerator::new();
        let a = gen.generate("cpu", "host1", &Tags::new(["a", "b"]));
        let b = gen.generate("cpu", "host1", &Tags::new(["b", "a"]));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_depends_on_every_part() {
        let gen = ContextKeyGenerator::new();
        let tags = Tags::new(["a"]);
        let base = gen.generate("cpu", "host1", &tags);

        assert_ne!(base, gen.generate("mem", "host1", &tags));
        assert_ne!(base, gen.generate("cpu", "host2", &tags));
        assert_ne!(base, gen.generate("cpu", "host1", &Tags::empty()));
        // name and host boundaries are not ambiguous
        assert_ne!(gen.generate("ab", "c", &tags), gen.generate("a", "bc", &tags));
    }

    #[test]
    fn test_display() {
        assert_eq!(ContextKey::from_raw(255).to_string(), "00000000000000ff");
    }
}
