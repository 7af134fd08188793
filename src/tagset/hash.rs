//! Stable hashing for strings and tag sets.
//!
//! All hashes come from a fixed-seed ahash state, so a value hashes the same
//! way in every instance of the process. Hashes are not meant to be persisted.
//!
//! Tag sets are hashed order-insensitively: each tag is hashed on its own and
//! the tag hashes are XOR-combined. Duplicate tags are skipped before
//! combining, since XOR-ing a hash twice would cancel it out.

use ahash::RandomState;
use rustc_hash::FxHashSet;
use std::hash::BuildHasher;

const SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

#[inline]
fn state() -> RandomState {
    RandomState::with_seeds(SEEDS[0], SEEDS[1], SEEDS[2], SEEDS[3])
}

/// Hash a byte sequence
#[inline]
pub fn hash_bytes(bytes: &[u8]) -> u64 {
    state().hash_one(bytes)
}

/// Hash a string. Equal to `hash_bytes(s.as_bytes())`.
#[inline]
pub fn hash_str(s: &str) -> u64 {
    hash_bytes(s.as_bytes())
}

/// Hash a collection of tags, ignoring order and duplicates.
///
/// Returns the combined hash and the number of distinct tags.
pub fn hash_tags<I, T>(tags: I) -> (u64, usize)
where
    I: IntoIterator<Item = T>,
    T: AsRef<str>,
{
    let mut seen = FxHashSet::default();
    let mut combined = 0u64;
    for tag in tags {
        let h = hash_str(tag.as_ref());
        if seen.insert(h) {
            combined ^= h;
        }
    }
    (combined, seen.len())
}

/// Combine already-hashed tags. `hashes` must come from distinct tags.
#[inline]
pub fn combine_hashes(hashes: &[u64]) -> u64 {
    hashes.iter().fold(0, |acc, h| acc ^ h)
}

/// Hash of a metric context: name, host and tag-set hash
#[inline]
pub fn hash_context(name: &str, host: &str, tags_hash: u64) -> u64 {
    state().hash_one((name, host, tags_hash))
}

/// Cache key for the union of two tag sets.
///
/// The key is asymmetric so that `union(a, b)` and `union(b, a)` occupy two
/// entries. Both resolve to the same canonical tag set.
#[inline]
pub fn union_key(a: u64, b: u64) -> u64 {
    a.rotate_left(17) ^ b ^ 0x9e37_79b9_7f4a_7c15
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(hash_str("env:prod"), hash_str("env:prod"));
        assert_ne!(hash_str("env:prod"), hash_str("env:staging"));
        assert_eq!(hash_str("x"), hash_bytes(b"x"));
    }

    #[test]
    fn test_tag_hash_ignores_order() {
        let (a, n) = hash_tags(["a", "b", "c"]);
        let (b, _) = hash_tags(["c", "a", "b"]);
        let (c, _) = hash_tags(["b", "c", "a"]);

        assert_eq!(n, 3);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_tag_hash_ignores_duplicates() {
        let (with_dup, n) = hash_tags(["a", "b", "a"]);
        let (without, _) = hash_tags(["a", "b"]);

        assert_eq!(n, 2);
        assert_eq!(with_dup, without);
    }

    #[test]
    fn test_empty_tags_hash_to_zero() {
        let (h, n) = hash_tags(Vec::<&str>::new());
        assert_eq!(h, 0);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_combine_matches_hash_tags() {
        let hashes = [hash_str("a"), hash_str("b")];
        assert_eq!(combine_hashes(&hashes), hash_tags(["b", "a"]).0);
    }

    #[test]
    fn test_union_key_is_ordered() {
        let a = hash_str("a");
        let b = hash_str("b");
        assert_ne!(union_key(a, b), union_key(b, a));
    }
}
