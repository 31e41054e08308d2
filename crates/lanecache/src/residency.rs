// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Admission control for cache storage.
//!
//! [`Residency`] wraps cache storage together with the eviction policy and is
//! the only path through which policies touch storage. Each mutation takes the
//! admission lock, so the set of tracked keys always equals the set of stored
//! keys and at most `capacity` entries are resident, even while different
//! lanes insert and evict at the same time.

use std::{hash::Hash, marker::PhantomData};

use lanecache_tier::{CacheStorage, Result};
use parking_lot::Mutex;

use crate::{
    cache::CacheName,
    eviction::EvictionPolicy,
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

pub(crate) struct Residency<K, V, S, E> {
    storage: S,
    eviction: E,
    admission: Mutex<()>,
    name: CacheName,
    telemetry: CacheTelemetry,
    _types: PhantomData<fn(K) -> V>,
}

impl<K, V, S, E> Residency<K, V, S, E> {
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<K, V, S, E> Residency<K, V, S, E>
where
    K: Clone + Eq + Hash,
    S: CacheStorage<K, V>,
    E: EvictionPolicy<K>,
{
    pub fn new(storage: S, eviction: E, name: CacheName, telemetry: CacheTelemetry) -> Self {
        Self {
            storage,
            eviction,
            admission: Mutex::new(()),
            name,
            telemetry,
            _types: PhantomData,
        }
    }

    /// Reads `key` and, if resident, marks it as used in the same step.
    pub fn lookup(&self, key: &K) -> Result<Option<V>> {
        let _admission = self.admission.lock();
        let value = self.storage.get(key)?;
        if value.is_some() {
            self.eviction.key_accessed(key);
        }
        Ok(value)
    }

    /// Marks `key` as used if it is resident.
    pub fn touch(&self, key: &K) {
        let _admission = self.admission.lock();
        if self.storage.contains_key(key) {
            self.eviction.key_accessed(key);
        }
    }

    /// Evicts until one more entry fits. Caller holds the admission lock.
    fn make_room(&self) -> Result<()> {
        while self.storage.len() >= self.storage.capacity() {
            let Some(victim) = self.eviction.evict_key() else {
                // Nothing left to nominate; storage rejects the insert itself.
                return Ok(());
            };

            if let Err(error) = self.storage.remove(&victim) {
                self.eviction.key_restored(&victim);
                return Err(error);
            }

            self.telemetry
                .record(self.name, CacheOperation::Evict, CacheActivity::Evicted, None);
        }

        Ok(())
    }
}

impl<K, V, S, E> CacheStorage<K, V> for Residency<K, V, S, E>
where
    K: Clone + Eq + Hash,
    S: CacheStorage<K, V>,
    E: EvictionPolicy<K>,
{
    fn get(&self, key: &K) -> Result<Option<V>> {
        self.storage.get(key)
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        let _admission = self.admission.lock();
        if !self.storage.contains_key(&key) {
            self.make_room()?;
        }

        self.storage.put(key.clone(), value)?;
        self.eviction.key_accessed(&key);
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<Option<V>> {
        let _admission = self.admission.lock();
        let removed = self.storage.remove(key)?;
        self.eviction.key_removed(key);
        Ok(removed)
    }

    fn clear(&self) -> Result<()> {
        let _admission = self.admission.lock();
        self.storage.clear()?;
        self.eviction.clear();
        Ok(())
    }

    fn contains_key(&self, key: &K) -> bool {
        self.storage.contains_key(key)
    }

    fn len(&self) -> usize {
        self.storage.len()
    }

    fn capacity(&self) -> usize {
        self.storage.capacity()
    }
}
