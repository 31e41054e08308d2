// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::future::Future;

use lanecache_tier::{BackingStore, CacheStorage, Result};

/// Propagates a write to cache storage and the backing store.
pub trait WritePolicy<K, V>: Send + Sync {
    /// Writes `value` under `key`.
    fn write<S, B>(&self, key: &K, value: V, storage: &S, store: &B) -> impl Future<Output = Result<()>> + Send
    where
        S: CacheStorage<K, V>,
        B: BackingStore<K, V>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Ordered,
    Concurrent,
}

/// Writes to both cache storage and the backing store.
///
/// The two writes are not a transaction. In [`ordered`](Self::ordered) mode
/// (the default) storage is written only after the store accepted the value,
/// so a failed store write leaves the cache untouched. In
/// [`concurrent`](Self::concurrent) mode both writes are in flight at once and
/// a failure of either one fails the operation without undoing the other.
#[derive(Debug, Clone, Copy)]
pub struct WriteThrough {
    mode: WriteMode,
}

impl WriteThrough {
    /// Writes the backing store first, then cache storage.
    #[must_use]
    pub const fn ordered() -> Self {
        Self { mode: WriteMode::Ordered }
    }

    /// Writes cache storage and the backing store at the same time.
    #[must_use]
    pub const fn concurrent() -> Self {
        Self {
            mode: WriteMode::Concurrent,
        }
    }

    /// Returns `true` for the concurrent mode.
    #[must_use]
    pub fn is_concurrent(&self) -> bool {
        self.mode == WriteMode::Concurrent
    }
}

impl Default for WriteThrough {
    fn default() -> Self {
        Self::ordered()
    }
}

impl<K, V> WritePolicy<K, V> for WriteThrough
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn write<S, B>(&self, key: &K, value: V, storage: &S, store: &B) -> Result<()>
    where
        S: CacheStorage<K, V>,
        B: BackingStore<K, V>,
    {
        match self.mode {
            WriteMode::Ordered => {
                store.write(key, value.clone()).await?;
                storage.put(key.clone(), value)
            }
            WriteMode::Concurrent => {
                let cached = value.clone();
                let (cached, stored) = futures::join!(async { storage.put(key.clone(), cached) }, store.write(key, value));
                cached.and(stored)
            }
        }
    }
}

/// Writes only to the backing store and drops any cached copy of the key.
///
/// The next read repopulates the cache through the read policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteAround;

impl<K, V> WritePolicy<K, V> for WriteAround
where
    K: Sync,
    V: Send,
{
    async fn write<S, B>(&self, key: &K, value: V, storage: &S, store: &B) -> Result<()>
    where
        S: CacheStorage<K, V>,
        B: BackingStore<K, V>,
    {
        store.write(key, value).await?;
        storage.remove(key)?;
        Ok(())
    }
}
