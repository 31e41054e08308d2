// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The bounded in-process container the cache keeps hot entries in.

use crate::Result;

/// Trait for bounded cache storage implementations.
///
/// A storage is a plain container: point lookup, insert, remove, existence
/// check and size query, all expected to be O(1) and never to block on I/O.
/// It holds no eviction logic. The orchestrator keeps it within
/// [`capacity`](Self::capacity) by evicting before it admits new keys.
///
/// Implementations must be safe for concurrent use. The orchestrator confines
/// each key to one lane, but different keys touch the same storage from many
/// lanes at once.
pub trait CacheStorage<K, V>: Send + Sync {
    /// Returns a copy of the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage fails unexpectedly.
    fn get(&self, key: &K) -> Result<Option<V>>;

    /// Inserts or overwrites the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityExceeded`](crate::ErrorKind::CapacityExceeded) when `key` is
    /// new and the storage is already full, or another error if the storage fails unexpectedly.
    fn put(&self, key: K, value: V) -> Result<()>;

    /// Removes `key`, returning the value it held. Removing a missing key is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage fails unexpectedly.
    fn remove(&self, key: &K) -> Result<Option<V>>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage fails unexpectedly.
    fn clear(&self) -> Result<()>;

    /// Returns `true` if `key` is currently stored.
    fn contains_key(&self, key: &K) -> bool;

    /// Returns the number of stored entries.
    fn len(&self) -> usize;

    /// Returns the fixed maximum number of entries, set at construction.
    fn capacity(&self) -> usize;

    /// Returns `true` if nothing is stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
