// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache configuration.

use std::{hash::Hash, marker::PhantomData, num::NonZeroUsize, sync::Arc, thread};

use lanecache_memory::{InMemoryStorage, InMemoryStore};
use lanecache_tier::{BackingStore, CacheStorage, Error, Result};
#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Meter, MeterProvider};
use tokio::runtime::Handle;

use crate::{
    Cache, Lanes,
    cache::{CacheInner, CacheName},
    eviction::{EvictionPolicy, LruPolicy},
    policy::{ReadPolicy, ReadThrough, WritePolicy, WriteThrough},
    residency::Residency,
    telemetry::CacheTelemetry,
};

const DEFAULT_NAME: CacheName = "lanecache";

/// Builder for [`Cache`].
///
/// Created by [`Cache::builder`]. Cache storage must be chosen with
/// [`memory`](Self::memory) or [`storage`](Self::storage) before the cache
/// can be built; every other setting has a default:
///
/// | Setting | Default |
/// |---|---|
/// | backing store | empty [`InMemoryStore`] |
/// | read policy | [`ReadThrough`] |
/// | write policy | [`WriteThrough::ordered`] |
/// | eviction | [`LruPolicy`] |
/// | lanes | available parallelism |
/// | lane queue | unbounded |
/// | runtime | the current Tokio runtime |
///
/// # Examples
///
/// ```
/// use lanecache::{Cache, policy::{ReadAround, WriteThrough}};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> lanecache::Result<()> {
///
/// let cache = Cache::builder::<u64, String>()
///     .name("profiles")
///     .memory(1_000)
///     .read_policy(ReadAround)
///     .write_policy(WriteThrough::concurrent())
///     .lanes(8)
///     .queue_capacity(10_000)
///     .logs()
///     .build()?;
///
/// assert_eq!(cache.capacity(), 1_000);
/// assert_eq!(cache.lane_count(), 8);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CacheBuilder<K, V, S = (), B = InMemoryStore<K, V>, R = ReadThrough, W = WriteThrough, E = LruPolicy<K>> {
    name: CacheName,
    storage: Result<S>,
    store: B,
    read_policy: R,
    write_policy: W,
    eviction: E,
    lanes: Option<usize>,
    queue_capacity: Option<usize>,
    runtime: Option<Handle>,
    logs: bool,
    #[cfg(feature = "metrics")]
    meter: Option<Meter>,
    _types: PhantomData<fn(K) -> V>,
}

impl<K, V> CacheBuilder<K, V, ()>
where
    K: Clone + Eq + Hash,
{
    pub(crate) fn new() -> Self {
        Self {
            name: DEFAULT_NAME,
            storage: Ok(()),
            store: InMemoryStore::new(),
            read_policy: ReadThrough,
            write_policy: WriteThrough::ordered(),
            eviction: LruPolicy::new(),
            lanes: None,
            queue_capacity: None,
            runtime: None,
            logs: false,
            #[cfg(feature = "metrics")]
            meter: None,
            _types: PhantomData,
        }
    }
}

impl<K, V, S, B, R, W, E> CacheBuilder<K, V, S, B, R, W, E> {
    /// Sets the name reported in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: CacheName) -> Self {
        self.name = name;
        self
    }

    /// Uses in-memory cache storage holding at most `capacity` entries.
    ///
    /// A zero capacity makes [`build`](Self::build) fail.
    #[must_use]
    pub fn memory(self, capacity: usize) -> CacheBuilder<K, V, InMemoryStorage<K, V>, B, R, W, E>
    where
        K: Eq + Hash,
    {
        self.with_storage(InMemoryStorage::with_capacity(capacity))
    }

    /// Uses custom cache storage. Its capacity bounds the cache.
    ///
    /// The storage must be empty when the cache is built.
    #[must_use]
    pub fn storage<S2>(self, storage: S2) -> CacheBuilder<K, V, S2, B, R, W, E>
    where
        S2: CacheStorage<K, V>,
    {
        self.with_storage(Ok(storage))
    }

    fn with_storage<S2>(self, storage: Result<S2>) -> CacheBuilder<K, V, S2, B, R, W, E> {
        CacheBuilder {
            name: self.name,
            storage,
            store: self.store,
            read_policy: self.read_policy,
            write_policy: self.write_policy,
            eviction: self.eviction,
            lanes: self.lanes,
            queue_capacity: self.queue_capacity,
            runtime: self.runtime,
            logs: self.logs,
            #[cfg(feature = "metrics")]
            meter: self.meter,
            _types: PhantomData,
        }
    }

    /// Sets the backing store, the system of record behind the cache.
    #[must_use]
    pub fn store<B2>(self, store: B2) -> CacheBuilder<K, V, S, B2, R, W, E>
    where
        B2: BackingStore<K, V>,
    {
        CacheBuilder {
            name: self.name,
            storage: self.storage,
            store,
            read_policy: self.read_policy,
            write_policy: self.write_policy,
            eviction: self.eviction,
            lanes: self.lanes,
            queue_capacity: self.queue_capacity,
            runtime: self.runtime,
            logs: self.logs,
            #[cfg(feature = "metrics")]
            meter: self.meter,
            _types: PhantomData,
        }
    }

    /// Sets how reads resolve misses.
    #[must_use]
    pub fn read_policy<R2>(self, read_policy: R2) -> CacheBuilder<K, V, S, B, R2, W, E>
    where
        R2: ReadPolicy<K, V>,
    {
        CacheBuilder {
            name: self.name,
            storage: self.storage,
            store: self.store,
            read_policy,
            write_policy: self.write_policy,
            eviction: self.eviction,
            lanes: self.lanes,
            queue_capacity: self.queue_capacity,
            runtime: self.runtime,
            logs: self.logs,
            #[cfg(feature = "metrics")]
            meter: self.meter,
            _types: PhantomData,
        }
    }

    /// Sets how writes reach storage and the backing store.
    #[must_use]
    pub fn write_policy<W2>(self, write_policy: W2) -> CacheBuilder<K, V, S, B, R, W2, E>
    where
        W2: WritePolicy<K, V>,
    {
        CacheBuilder {
            name: self.name,
            storage: self.storage,
            store: self.store,
            read_policy: self.read_policy,
            write_policy,
            eviction: self.eviction,
            lanes: self.lanes,
            queue_capacity: self.queue_capacity,
            runtime: self.runtime,
            logs: self.logs,
            #[cfg(feature = "metrics")]
            meter: self.meter,
            _types: PhantomData,
        }
    }

    /// Sets the eviction policy.
    #[must_use]
    pub fn eviction<E2>(self, eviction: E2) -> CacheBuilder<K, V, S, B, R, W, E2>
    where
        E2: EvictionPolicy<K>,
    {
        CacheBuilder {
            name: self.name,
            storage: self.storage,
            store: self.store,
            read_policy: self.read_policy,
            write_policy: self.write_policy,
            eviction,
            lanes: self.lanes,
            queue_capacity: self.queue_capacity,
            runtime: self.runtime,
            logs: self.logs,
            #[cfg(feature = "metrics")]
            meter: self.meter,
            _types: PhantomData,
        }
    }

    /// Sets the number of lanes. Zero makes [`build`](Self::build) fail.
    #[must_use]
    pub fn lanes(mut self, lanes: usize) -> Self {
        self.lanes = Some(lanes);
        self
    }

    /// Bounds each lane's queue. Submissions to a full lane fail with
    /// [`ErrorKind::QueueOverflow`](lanecache_tier::ErrorKind::QueueOverflow).
    #[must_use]
    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = Some(queue_capacity);
        self
    }

    /// Runs the lanes on `runtime` instead of the current runtime.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Emits a `tracing` event for every operation.
    #[must_use]
    pub fn logs(mut self) -> Self {
        self.logs = true;
        self
    }

    /// Records OpenTelemetry metrics through `meter_provider`.
    #[cfg(feature = "metrics")]
    #[must_use]
    pub fn metrics(mut self, meter_provider: &dyn MeterProvider) -> Self {
        self.meter = Some(crate::telemetry::metrics::create_meter(meter_provider));
        self
    }

    fn telemetry(&self) -> CacheTelemetry {
        #[cfg(feature = "metrics")]
        if let Some(meter) = &self.meter {
            return CacheTelemetry::with_meter(self.logs, meter);
        }
        CacheTelemetry::new(self.logs)
    }
}

impl<K, V, S, B, R, W, E> CacheBuilder<K, V, S, B, R, W, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: CacheStorage<K, V> + 'static,
    B: BackingStore<K, V> + 'static,
    R: ReadPolicy<K, V> + 'static,
    W: WritePolicy<K, V> + 'static,
    E: EvictionPolicy<K> + 'static,
{
    /// Builds the cache and starts its lanes.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityInvariant`](lanecache_tier::ErrorKind::CapacityInvariant)
    /// if the storage capacity or lane count is zero, the storage is not empty,
    /// or no runtime was given and none is current.
    pub fn build(self) -> Result<Cache<K, V, S, B, R, W, E>> {
        let telemetry = self.telemetry();
        let storage = self.storage?;

        if storage.capacity() == 0 {
            return Err(Error::invalid_config("cache storage capacity must be greater than zero"));
        }
        if !storage.is_empty() {
            return Err(Error::invalid_config("cache storage must be empty when the cache is built"));
        }

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| Error::invalid_config(format!("cannot run cache lanes: {e}")))?,
        };
        let lane_count = self.lanes.unwrap_or_else(default_lane_count);
        let lanes = Lanes::new(lane_count, self.queue_capacity, runtime)?;

        tracing::debug!(
            cache.name = self.name,
            capacity = storage.capacity(),
            lanes = lane_count,
            "cache built"
        );

        Ok(Cache {
            inner: Arc::new(CacheInner {
                name: self.name,
                residency: Residency::new(storage, self.eviction, self.name, telemetry.clone()),
                store: self.store,
                read_policy: self.read_policy,
                write_policy: self.write_policy,
                telemetry,
            }),
            lanes: Arc::new(lanes),
        })
    }
}

fn default_lane_count() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

#[cfg(test)]
mod tests {
    use lanecache_tier::{ErrorKind, testing::MockStorage};

    use super::*;

    #[tokio::test]
    async fn defaults() -> Result<()> {
        let cache = Cache::builder::<String, i32>().memory(4).build()?;

        assert_eq!(cache.name(), DEFAULT_NAME);
        assert_eq!(cache.capacity(), 4);
        assert_eq!(cache.lane_count(), default_lane_count());
        assert!(!cache.write_policy().is_concurrent());
        assert!(cache.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn zero_capacity_is_rejected() {
        let error = Cache::builder::<String, i32>().memory(0).build().expect_err("zero capacity");
        assert!(matches!(error.kind(), ErrorKind::CapacityInvariant(_)));
    }

    #[tokio::test]
    async fn zero_lanes_are_rejected() {
        let error = Cache::builder::<String, i32>()
            .memory(1)
            .lanes(0)
            .build()
            .expect_err("zero lanes");
        assert!(matches!(error.kind(), ErrorKind::CapacityInvariant(_)));
    }

    #[tokio::test]
    async fn populated_storage_is_rejected() {
        let storage = MockStorage::new(2);
        storage.put("A", 1).expect("seed");

        let error = Cache::builder::<&str, i32>().storage(storage).build().expect_err("storage not empty");
        assert!(matches!(error.kind(), ErrorKind::CapacityInvariant(_)));
    }

    #[test]
    fn building_outside_a_runtime_fails() {
        let error = Cache::builder::<String, i32>().memory(1).build().expect_err("no runtime");
        assert!(matches!(error.kind(), ErrorKind::CapacityInvariant(_)));
    }

    #[test]
    fn explicit_runtime_is_used() -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread().build().expect("runtime");
        let cache = Cache::builder::<String, i32>()
            .memory(1)
            .lanes(2)
            .runtime(runtime.handle().clone())
            .build()?;

        runtime.block_on(async {
            cache.update(&"k".to_string(), 7).await?;
            assert_eq!(cache.access(&"k".to_string()).await?, 7);
            Ok::<_, Error>(())
        })
    }
}
