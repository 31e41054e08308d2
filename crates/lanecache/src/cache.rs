// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache orchestrator.

use std::{fmt::Debug, hash::Hash, sync::Arc, time::Instant};

use lanecache_memory::{InMemoryStorage, InMemoryStore};
use lanecache_tier::{BackingStore, CacheStorage, Error, Result};

use crate::{
    Completion, Lanes,
    builder::CacheBuilder,
    eviction::{EvictionPolicy, LruPolicy},
    policy::{ReadPolicy, ReadThrough, WritePolicy, WriteThrough},
    residency::Residency,
    telemetry::{CacheActivity, CacheOperation, CacheTelemetry},
};

/// Name identifying a cache in logs and metrics.
pub type CacheName = &'static str;

pub(crate) struct CacheInner<K, V, S, B, R, W, E> {
    pub(crate) name: CacheName,
    pub(crate) residency: Residency<K, V, S, E>,
    pub(crate) store: B,
    pub(crate) read_policy: R,
    pub(crate) write_policy: W,
    pub(crate) telemetry: CacheTelemetry,
}

impl<K, V, S, B, R, W, E> CacheInner<K, V, S, B, R, W, E>
where
    K: Clone + Eq + Hash + Send + Sync,
    V: Clone + Send + Sync,
    S: CacheStorage<K, V>,
    B: BackingStore<K, V>,
    R: ReadPolicy<K, V>,
    W: WritePolicy<K, V>,
    E: EvictionPolicy<K>,
{
    async fn access(&self, key: &K) -> Result<V> {
        let started = Instant::now();
        let outcome = self.load(key).await;

        let activity = match &outcome {
            Ok((_, true)) => CacheActivity::Hit,
            Ok((_, false)) => CacheActivity::Miss,
            Err(e) if e.is_not_found() => CacheActivity::NotFound,
            Err(_) => CacheActivity::Error,
        };
        self.finish(CacheOperation::Access, activity, started);

        outcome.map(|(value, _)| value)
    }

    /// Returns the value and whether it was already resident.
    async fn load(&self, key: &K) -> Result<(V, bool)> {
        if let Some(value) = self.residency.lookup(key)? {
            return Ok((value, true));
        }

        match self.read_policy.read(key, &self.residency, &self.store).await? {
            Some(value) => {
                self.residency.touch(key);
                Ok((value, false))
            }
            None => Err(Error::not_found()),
        }
    }

    async fn update(&self, key: &K, value: V) -> Result<()> {
        let started = Instant::now();
        let outcome = self.write_policy.write(key, value, &self.residency, &self.store).await;

        let activity = if outcome.is_ok() {
            self.residency.touch(key);
            CacheActivity::Updated
        } else {
            CacheActivity::Error
        };
        self.finish(CacheOperation::Update, activity, started);

        outcome
    }

    fn invalidate(&self, key: &K) -> Result<()> {
        let started = Instant::now();
        let outcome = self.residency.remove(key).map(drop);
        let activity = if outcome.is_ok() { CacheActivity::Invalidated } else { CacheActivity::Error };
        self.finish(CacheOperation::Invalidate, activity, started);
        outcome
    }

    async fn delete(&self, key: &K) -> Result<()> {
        let started = Instant::now();
        let outcome = match self.store.delete(key).await {
            Ok(()) => self.residency.remove(key).map(drop),
            Err(e) => Err(e),
        };
        let activity = if outcome.is_ok() { CacheActivity::Deleted } else { CacheActivity::Error };
        self.finish(CacheOperation::Delete, activity, started);
        outcome
    }

    fn finish(&self, operation: CacheOperation, activity: CacheActivity, started: Instant) {
        self.telemetry.record(self.name, operation, activity, Some(started.elapsed()));
        self.telemetry.record_size(self.name, self.residency.len());
    }
}

/// A bounded read/write-through cache in front of a backing store.
///
/// Every operation is routed to the lane that owns its key and queued there
/// immediately; the returned [`Completion`] resolves once the operation has
/// run. Operations on the same key therefore take effect in the order they
/// were issued, so an [`access`](Self::access) issued after an
/// [`update`](Self::update) of the same key observes the written value.
///
/// Cache storage never holds more than its capacity. Inserting a new key
/// into a full cache first evicts the entry chosen by the eviction policy
/// (least recently used by default). Evicted entries remain in the backing
/// store and are read back on the next access.
///
/// Clones share the same storage, store and lanes.
///
/// # Examples
///
/// ```
/// use lanecache::Cache;
/// use lanecache_memory::InMemoryStore;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> lanecache::Result<()> {
///
/// let store = InMemoryStore::with_data([("A", "Apple"), ("B", "Banana"), ("C", "Cherry")]);
/// let cache = Cache::builder::<&str, &str>()
///     .memory(2)
///     .store(store.clone())
///     .build()?;
///
/// assert_eq!(cache.access(&"A").await?, "Apple");
/// assert_eq!(cache.access(&"B").await?, "Banana");
/// assert_eq!(cache.access(&"C").await?, "Cherry");
///
/// // "A" was least recently used and has been evicted.
/// assert!(!cache.contains(&"A"));
/// assert_eq!(cache.len(), 2);
///
/// cache.update(&"D", "Date").await?;
/// assert!(store.contains_key(&"D"));
/// # cache.shutdown_and_wait().await;
/// # Ok(())
/// # }
/// ```
pub struct Cache<K, V, S = InMemoryStorage<K, V>, B = InMemoryStore<K, V>, R = ReadThrough, W = WriteThrough, E = LruPolicy<K>> {
    pub(crate) inner: Arc<CacheInner<K, V, S, B, R, W, E>>,
    pub(crate) lanes: Arc<Lanes>,
}

impl Cache<(), ()> {
    /// Starts building a cache for keys `K` and values `V`.
    #[must_use]
    pub fn builder<K, V>() -> CacheBuilder<K, V, ()>
    where
        K: Clone + Eq + Hash,
    {
        CacheBuilder::new()
    }
}

impl<K, V, S, B, R, W, E> Cache<K, V, S, B, R, W, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: CacheStorage<K, V> + 'static,
    B: BackingStore<K, V> + 'static,
    R: ReadPolicy<K, V> + 'static,
    W: WritePolicy<K, V> + 'static,
    E: EvictionPolicy<K> + 'static,
{
    /// Reads `key`, serving it from cache storage or loading it through the read policy.
    ///
    /// Resolves to [`ErrorKind::NotFound`](lanecache_tier::ErrorKind::NotFound)
    /// if neither tier has the key.
    pub fn access(&self, key: &K) -> Completion<V> {
        let inner = Arc::clone(&self.inner);
        let owned = key.clone();
        self.lanes.submit(key, async move { inner.access(&owned).await })
    }

    /// Writes `value` under `key` through the write policy.
    pub fn update(&self, key: &K, value: V) -> Completion<()> {
        let inner = Arc::clone(&self.inner);
        let owned = key.clone();
        self.lanes.submit(key, async move { inner.update(&owned, value).await })
    }

    /// Drops the cached copy of `key`. The backing store is left alone.
    pub fn invalidate(&self, key: &K) -> Completion<()> {
        let inner = Arc::clone(&self.inner);
        let owned = key.clone();
        self.lanes.submit(key, async move { inner.invalidate(&owned) })
    }

    /// Deletes `key` from the backing store, then from cache storage.
    ///
    /// If the store rejects the delete, the cached copy is kept.
    pub fn delete(&self, key: &K) -> Completion<()> {
        let inner = Arc::clone(&self.inner);
        let owned = key.clone();
        self.lanes.submit(key, async move { inner.delete(&owned).await })
    }

    /// Returns `true` if `key` is currently resident in cache storage.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.inner.residency.contains_key(key)
    }
}

impl<K, V, S, B, R, W, E> Cache<K, V, S, B, R, W, E>
where
    S: CacheStorage<K, V>,
{
    /// Returns the name of this cache.
    #[must_use]
    pub fn name(&self) -> CacheName {
        self.inner.name
    }

    /// Returns the number of resident entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.residency.storage().len()
    }

    /// Returns `true` if no entry is resident.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the maximum number of resident entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.residency.storage().capacity()
    }

    /// Returns the read policy.
    #[must_use]
    pub fn read_policy(&self) -> &R {
        &self.inner.read_policy
    }

    /// Returns the write policy.
    #[must_use]
    pub fn write_policy(&self) -> &W {
        &self.inner.write_policy
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &B {
        &self.inner.store
    }

    /// Returns the number of lanes operations are spread over.
    #[must_use]
    pub fn lane_count(&self) -> usize {
        self.lanes.lane_count()
    }

    /// Stops accepting operations. Already queued operations still complete.
    ///
    /// Applies to every clone of this cache. Idempotent.
    pub fn shutdown(&self) {
        self.lanes.shutdown();
    }

    /// Stops accepting operations and waits for queued ones to complete.
    pub async fn shutdown_and_wait(&self) {
        self.lanes.shutdown_and_wait().await;
    }
}

impl<K, V, S, B, R, W, E> Clone for Cache<K, V, S, B, R, W, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            lanes: Arc::clone(&self.lanes),
        }
    }
}

impl<K, V, S, B, R, W, E> Debug for Cache<K, V, S, B, R, W, E>
where
    S: CacheStorage<K, V>,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("name", &self.inner.name)
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("lanes", &self.lane_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use lanecache_tier::testing::MockStore;

    use super::*;
    use crate::telemetry::testing::LogCapture;

    #[tokio::test]
    async fn operations_are_logged_when_enabled() -> Result<()> {
        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());

        let cache = Cache::builder::<&str, i32>()
            .name("logged")
            .memory(1)
            .store(MockStore::with_data([("A", 1)]))
            .logs()
            .build()?;

        cache.access(&"A").await?;
        cache.access(&"A").await?;
        cache.update(&"B", 2).await?;
        cache.invalidate(&"B").await?;
        assert!(cache.access(&"Z").await.expect_err("missing").is_not_found());

        assert_eq!(
            capture.activities("logged"),
            [
                "cache.miss",
                "cache.hit",
                "cache.evicted",
                "cache.updated",
                "cache.invalidated",
                "cache.not_found",
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn operations_are_silent_by_default() -> Result<()> {
        let cache = Cache::builder::<&str, i32>()
            .memory(1)
            .store(MockStore::with_data([("A", 1)]))
            .build()?;

        let capture = LogCapture::new();
        let _guard = tracing::subscriber::set_default(capture.subscriber());
        cache.access(&"A").await?;

        assert!(capture.events().iter().all(|event| event.field("message") != Some("cache.event")));
        Ok(())
    }

    #[cfg(feature = "metrics")]
    #[tokio::test]
    async fn operations_are_metered() -> Result<()> {
        use crate::telemetry::{CacheActivity, CacheOperation, testing::MetricTester};

        let tester = MetricTester::new();
        let cache = Cache::builder::<&str, i32>()
            .name("metered")
            .memory(1)
            .store(MockStore::with_data([("A", 1)]))
            .metrics(tester.meter_provider())
            .build()?;

        cache.access(&"A").await?;
        cache.access(&"A").await?;

        cache.update(&"B", 2).await?;

        assert_eq!(tester.event_count("metered", CacheActivity::Miss), 1);
        assert_eq!(tester.event_count("metered", CacheActivity::Hit), 1);
        assert_eq!(tester.event_count("metered", CacheActivity::Evicted), 1);
        assert_eq!(tester.event_count("metered", CacheActivity::Updated), 1);
        assert_eq!(tester.duration_samples("metered", CacheOperation::Access), 2);
        assert_eq!(tester.size("metered"), Some(1));
        Ok(())
    }
}
