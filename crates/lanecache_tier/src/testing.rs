// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Mock cache storage and backing store for testing.
//!
//! [`MockStore`] and [`MockStorage`] keep their data in memory, record every operation and can be
//! told to fail or slow down specific operations so error and concurrency
//! paths of the cache can be exercised deterministically.

use std::{collections::HashMap, hash::Hash, sync::Arc, time::Duration};

use parking_lot::Mutex;

use crate::{BackingStore, CacheStorage, Error, ErrorKind};

/// Recorded backing store operation with full context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp<K, V> {
    /// A read was performed with the given key.
    Read(K),
    /// A write was performed with the given key and value.
    Write {
        /// The key that was written.
        key: K,
        /// The value that was written.
        value: V,
    },
    /// A delete was performed with the given key.
    Delete(K),
}

type FailPredicate<K, V> = Box<dyn Fn(&StoreOp<K, V>) -> bool + Send + Sync>;

/// A configurable mock backing store for testing.
///
/// Clones share the same rows, operation log and failure configuration, so a
/// test can keep one clone for assertions after handing another to a cache.
///
/// # Failure Injection
///
/// ```
/// use lanecache_tier::BackingStore;
/// use lanecache_tier::testing::{MockStore, StoreOp};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let store = MockStore::<String, i32>::new();
///
/// // Fail writes for one key only
/// store.fail_when(|op| matches!(op, StoreOp::Write { key, .. } if key == "forbidden"));
///
/// assert!(store.write(&"forbidden".to_string(), 1).await.is_err());
/// assert!(store.write(&"allowed".to_string(), 1).await.is_ok());
/// # });
/// ```
pub struct MockStore<K, V> {
    rows: Arc<Mutex<HashMap<K, V>>>,
    operations: Arc<Mutex<Vec<StoreOp<K, V>>>>,
    fail_when: Arc<Mutex<Option<FailPredicate<K, V>>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl<K, V> std::fmt::Debug for MockStore<K, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("rows", &self.rows)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .field("delay", &self.delay)
            .finish()
    }
}

impl<K, V> Clone for MockStore<K, V> {
    fn clone(&self) -> Self {
        Self {
            rows: Arc::clone(&self.rows),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
            delay: Arc::clone(&self.delay),
        }
    }
}

impl<K, V> Default for MockStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MockStore<K, V> {
    /// Creates a new empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
            delay: Arc::new(Mutex::new(None)),
        }
    }

    /// Makes every subsequent operation sleep for `delay` before completing.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }
}

impl<K, V> MockStore<K, V>
where
    K: Eq + Hash,
{
    /// Creates a mock store with pre-populated rows.
    #[must_use]
    pub fn with_data(rows: impl IntoIterator<Item = (K, V)>) -> Self {
        let store = Self::new();
        store.rows.lock().extend(rows);
        store
    }

    /// Returns the number of stored rows.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.lock().len()
    }

    /// Returns true if the store holds a row for `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.rows.lock().contains_key(key)
    }
}

impl<K, V> MockStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Returns the stored value for `key` without recording an operation.
    #[must_use]
    pub fn peek(&self, key: &K) -> Option<V> {
        self.rows.lock().get(key).cloned()
    }
}

impl<K, V> MockStore<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Sets a predicate that determines which operations fail.
    ///
    /// Failing operations are still recorded but leave the rows untouched.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StoreOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StoreOp<K, V>> {
        self.operations.lock().clone()
    }

    /// Clears all recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: StoreOp<K, V>) -> bool {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        fail
    }

    async fn pause(&self) {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl<K, V> BackingStore<K, V> for MockStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    async fn read(&self, key: &K) -> Result<Option<V>, Error> {
        self.pause().await;
        if self.record(StoreOp::Read(key.clone())) {
            return Err(Error::storage_fault("mock: read failed"));
        }
        Ok(self.rows.lock().get(key).cloned())
    }

    async fn write(&self, key: &K, value: V) -> Result<(), Error> {
        self.pause().await;
        let op = StoreOp::Write {
            key: key.clone(),
            value: value.clone(),
        };
        if self.record(op) {
            return Err(Error::storage_fault("mock: write failed"));
        }
        self.rows.lock().insert(key.clone(), value);
        Ok(())
    }

    async fn delete(&self, key: &K) -> Result<(), Error> {
        self.pause().await;
        if self.record(StoreOp::Delete(key.clone())) {
            return Err(Error::storage_fault("mock: delete failed"));
        }
        self.rows.lock().remove(key);
        Ok(())
    }
}

/// Recorded cache storage operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp<K, V> {
    /// A lookup was performed with the given key.
    Get(K),
    /// An insert or overwrite was performed with the given key and value.
    Put {
        /// The key that was stored.
        key: K,
        /// The value that was stored.
        value: V,
    },
    /// A removal was performed with the given key.
    Remove(K),
    /// The storage was cleared.
    Clear,
}

type StorageFailPredicate<K, V> = Box<dyn Fn(&StorageOp<K, V>) -> bool + Send + Sync>;

/// A bounded, failure-injecting cache storage for testing.
///
/// Behaves like a plain bounded map: new keys are refused once `capacity`
/// entries are stored, overwrites always succeed. Clones share state.
pub struct MockStorage<K, V> {
    capacity: usize,
    entries: Arc<Mutex<HashMap<K, V>>>,
    operations: Arc<Mutex<Vec<StorageOp<K, V>>>>,
    fail_when: Arc<Mutex<Option<StorageFailPredicate<K, V>>>>,
}

impl<K, V> std::fmt::Debug for MockStorage<K, V>
where
    K: std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStorage")
            .field("capacity", &self.capacity)
            .field("entries", &self.entries)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish_non_exhaustive()
    }
}

impl<K, V> Clone for MockStorage<K, V> {
    fn clone(&self) -> Self {
        Self {
            capacity: self.capacity,
            entries: Arc::clone(&self.entries),
            operations: Arc::clone(&self.operations),
            fail_when: Arc::clone(&self.fail_when),
        }
    }
}

impl<K, V> MockStorage<K, V> {
    /// Creates an empty mock storage holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: Arc::new(Mutex::new(HashMap::new())),
            operations: Arc::new(Mutex::new(Vec::new())),
            fail_when: Arc::new(Mutex::new(None)),
        }
    }
}

impl<K, V> MockStorage<K, V>
where
    K: Clone,
    V: Clone,
{
    /// Sets a predicate that determines which operations fail.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&StorageOp<K, V>) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Clears the failure predicate, allowing all operations to succeed.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// Returns a clone of all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp<K, V>> {
        self.operations.lock().clone()
    }

    fn record(&self, op: StorageOp<K, V>) -> bool {
        let fail = self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(&op));
        self.operations.lock().push(op);
        fail
    }
}

impl<K, V> CacheStorage<K, V> for MockStorage<K, V>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Result<Option<V>, Error> {
        if self.record(StorageOp::Get(key.clone())) {
            return Err(Error::storage_fault("mock: get failed"));
        }
        Ok(self.entries.lock().get(key).cloned())
    }

    fn put(&self, key: K, value: V) -> Result<(), Error> {
        let op = StorageOp::Put {
            key: key.clone(),
            value: value.clone(),
        };
        if self.record(op) {
            return Err(Error::storage_fault("mock: put failed"));
        }
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            return Err(ErrorKind::CapacityExceeded { capacity: self.capacity }.into());
        }
        entries.insert(key, value);
        Ok(())
    }

    fn remove(&self, key: &K) -> Result<Option<V>, Error> {
        if self.record(StorageOp::Remove(key.clone())) {
            return Err(Error::storage_fault("mock: remove failed"));
        }
        Ok(self.entries.lock().remove(key))
    }

    fn clear(&self) -> Result<(), Error> {
        if self.record(StorageOp::Clear) {
            return Err(Error::storage_fault("mock: clear failed"));
        }
        self.entries.lock().clear();
        Ok(())
    }

    fn contains_key(&self, key: &K) -> bool {
        self.entries.lock().contains_key(key)
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }
}
