// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Simulated durable backing store.

use std::{collections::HashMap, hash::Hash, sync::Arc};

use lanecache_tier::{BackingStore, Result};
use parking_lot::RwLock;

/// An unbounded in-memory backing store that always succeeds.
///
/// Stands in for a real database: it is instance-scoped, shared by clones,
/// and satisfies the same [`BackingStore`] contract a networked store would.
///
/// # Examples
///
/// ```
/// use lanecache_memory::InMemoryStore;
/// use lanecache_tier::BackingStore;
/// # futures::executor::block_on(async {
///
/// let store = InMemoryStore::with_data([("A", "Apple"), ("B", "Banana")]);
/// store.write(&"C", "Cherry").await?;
/// assert_eq!(store.len(), 3);
/// # Ok::<(), lanecache_tier::Error>(())
/// # });
/// ```
#[derive(Debug)]
pub struct InMemoryStore<K, V> {
    rows: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for InMemoryStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
        }
    }
}

impl<K, V> Default for InMemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> InMemoryStore<K, V> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash,
{
    /// Creates a store preloaded with `rows`.
    #[must_use]
    pub fn with_data(rows: impl IntoIterator<Item = (K, V)>) -> Self {
        Self {
            rows: Arc::new(RwLock::new(rows.into_iter().collect())),
        }
    }

    /// Returns the number of stored rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns `true` if the store holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Returns `true` if the store holds a row for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.rows.read().contains_key(key)
    }
}

impl<K, V> BackingStore<K, V> for InMemoryStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn read(&self, key: &K) -> Result<Option<V>> {
        Ok(self.rows.read().get(key).cloned())
    }

    async fn write(&self, key: &K, value: V) -> Result<()> {
        self.rows.write().insert(key.clone(), value);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<()> {
        self.rows.write().remove(key);
        Ok(())
    }
}
