// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::future::Future;

use lanecache_tier::{BackingStore, CacheStorage, Result};

/// Resolves a key against cache storage and the backing store.
pub trait ReadPolicy<K, V>: Send + Sync {
    /// Looks up `key`, returning `Ok(None)` if neither tier has it.
    fn read<S, B>(&self, key: &K, storage: &S, store: &B) -> impl Future<Output = Result<Option<V>>> + Send
    where
        S: CacheStorage<K, V>,
        B: BackingStore<K, V>;
}

/// Reads from storage, falling back to the store and caching what it returns.
///
/// A value missing from both tiers is not cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadThrough;

impl<K, V> ReadPolicy<K, V> for ReadThrough
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn read<S, B>(&self, key: &K, storage: &S, store: &B) -> Result<Option<V>>
    where
        S: CacheStorage<K, V>,
        B: BackingStore<K, V>,
    {
        if let Some(value) = storage.get(key)? {
            return Ok(Some(value));
        }

        let Some(value) = store.read(key).await? else {
            return Ok(None);
        };

        storage.put(key.clone(), value.clone())?;
        Ok(Some(value))
    }
}

/// Reads from storage, falling back to the store without caching the result.
///
/// Useful for keys that are read once and would only displace hotter entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadAround;

impl<K, V> ReadPolicy<K, V> for ReadAround
where
    K: Sync,
    V: Send,
{
    async fn read<S, B>(&self, key: &K, storage: &S, store: &B) -> Result<Option<V>>
    where
        S: CacheStorage<K, V>,
        B: BackingStore<K, V>,
    {
        match storage.get(key)? {
            Some(value) => Ok(Some(value)),
            None => store.read(key).await,
        }
    }
}
