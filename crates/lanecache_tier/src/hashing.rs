// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::hash::{Hash, Hasher};

use xxhash_rust::xxh3::Xxh3Default;

/// Hashes a value with a fixed-seed `xxh3` hasher.
///
/// The result depends only on the value, never on process-level random
/// state, so lane assignment and ring placement stay stable for the lifetime
/// of a cache and agree across every node of a distributed deployment.
///
/// # Examples
///
/// ```
/// use lanecache_tier::stable_hash;
///
/// assert_eq!(stable_hash("apple"), stable_hash("apple"));
/// ```
#[must_use]
pub fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = Xxh3Default::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_hash_equally() {
        assert_eq!(stable_hash(&42_u64), stable_hash(&42_u64));
        assert_eq!(stable_hash(&"key".to_string()), stable_hash("key"));
    }

    #[test]
    fn different_values_usually_differ() {
        let hashes: std::collections::HashSet<u64> = (0..1000_u32).map(|i| stable_hash(&i)).collect();
        assert_eq!(hashes.len(), 1000);
    }
}
