// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Eviction policies.
//!
//! An [`EvictionPolicy`] only tracks keys and nominates victims. It never
//! touches cache storage; the cache removes the nominated entry itself and
//! keeps the policy's view of resident keys in step with storage.

mod lru;

pub use lru::LruPolicy;

/// Tracks key usage and chooses which key to evict next.
///
/// Implementations are shared between lanes and must be internally
/// synchronized. The cache serializes admission decisions around
/// [`evict_key`](Self::evict_key), so a policy does not need to coordinate
/// victim selection with concurrent inserts itself.
pub trait EvictionPolicy<K>: Send + Sync {
    /// Records a use of `key`, starting to track it if it was not tracked yet.
    fn key_accessed(&self, key: &K);

    /// Removes and returns the next victim, or `None` if nothing is tracked.
    fn evict_key(&self) -> Option<K>;

    /// Puts back a key returned by [`evict_key`](Self::evict_key) whose
    /// removal from storage failed. It must become the next victim again.
    fn key_restored(&self, key: &K);

    /// Stops tracking `key`. Does nothing for untracked keys.
    fn key_removed(&self, key: &K);

    /// Stops tracking every key.
    fn clear(&self);

    /// Returns the number of tracked keys.
    fn len(&self) -> usize;

    /// Returns `true` if no key is tracked.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
