// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Bounded in-memory cache storage.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use lanecache_tier::{CacheStorage, Error, ErrorKind, Result};
use parking_lot::RwLock;

/// A bounded, thread-safe in-memory cache storage.
///
/// The storage holds at most `capacity` entries. Inserting a new key while
/// full is refused with [`ErrorKind::CapacityExceeded`]; overwriting an
/// existing key always succeeds. Choosing what to drop is the orchestrator's
/// job, so the storage never evicts on its own.
///
/// Clones share the same entries.
///
/// # Examples
///
/// ```
/// use lanecache_memory::InMemoryStorage;
/// use lanecache_tier::CacheStorage;
///
/// let storage = InMemoryStorage::<&str, i32>::with_capacity(1)?;
/// storage.put("a", 1)?;
/// assert!(storage.put("b", 2).is_err());
///
/// storage.remove(&"a")?;
/// storage.put("b", 2)?;
/// assert_eq!(storage.len(), 1);
/// # Ok::<(), lanecache_tier::Error>(())
/// ```
#[derive(Debug)]
pub struct InMemoryStorage<K, V> {
    capacity: usize,
    entries: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for InMemoryStorage<K, V> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> InMemoryStorage<K, V>
where
    K: Eq + Hash,
{
    /// Creates an empty storage that holds at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityInvariant`] if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid_config("cache storage capacity must be greater than zero"));
        }

        Ok(Self {
            capacity,
            entries: Arc::new(RwLock::new(HashMap::with_capacity(capacity))),
        })
    }
}

impl<K, V> CacheStorage<K, V> for InMemoryStorage<K, V>
where
    K: Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn put(&self, key: K, value: V) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            return Err(ErrorKind::CapacityExceeded { capacity: self.capacity }.into());
        }
        entries.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<Option<V>> {
        Ok(self.entries.write().remove(key))
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().clear();
        Ok(())
    }

    fn contains_key(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.read().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
