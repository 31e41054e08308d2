// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The durable system of record behind the cache.

use crate::Result;

/// Trait for backing store implementations.
///
/// The backing store has unbounded capacity and is the source of truth: the
/// cache loads from it on a miss and writes to it on every update. Eviction
/// never deletes from it. Operations may fail, in which case the error is
/// surfaced through the cache operation that issued them.
pub trait BackingStore<K, V>: Send + Sync {
    /// Reads the value stored under `key`, returning `None` if it is absent.
    fn read(&self, key: &K) -> impl Future<Output = Result<Option<V>>> + Send;

    /// Writes `value` under `key`, overwriting any previous value.
    fn write(&self, key: &K, value: V) -> impl Future<Output = Result<()>> + Send;

    /// Deletes `key`. Deleting a missing key is a no-op.
    fn delete(&self, key: &K) -> impl Future<Output = Result<()>> + Send;
}
