// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Cache nodes: one master and its replicas.

use std::{future::Future, hash::Hash};

use lanecache::{Cache, eviction::EvictionPolicy, policy::{ReadPolicy, WritePolicy}};
use lanecache_tier::{BackingStore, CacheStorage, Result};

use crate::NodeId;

/// A cache instance that can serve as a master or replica.
///
/// Returned futures own everything they need, so replication can be handed
/// to a background task. Implemented for every [`Cache`].
pub trait NodeCache<K, V>: Send + Sync + 'static {
    /// Reads `key`.
    fn get(&self, key: &K) -> impl Future<Output = Result<V>> + Send + 'static;

    /// Writes `value` under `key`.
    fn put(&self, key: &K, value: V) -> impl Future<Output = Result<()>> + Send + 'static;

    /// Stops accepting operations.
    fn shutdown(&self);
}

impl<K, V, S, B, R, W, E> NodeCache<K, V> for Cache<K, V, S, B, R, W, E>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: CacheStorage<K, V> + 'static,
    B: BackingStore<K, V> + 'static,
    R: ReadPolicy<K, V> + 'static,
    W: WritePolicy<K, V> + 'static,
    E: EvictionPolicy<K> + 'static,
{
    fn get(&self, key: &K) -> impl Future<Output = Result<V>> + Send + 'static {
        self.access(key)
    }

    fn put(&self, key: &K, value: V) -> impl Future<Output = Result<()>> + Send + 'static {
        self.update(key, value)
    }

    fn shutdown(&self) {
        Self::shutdown(self);
    }
}

/// What a cache instance does for its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Takes every write synchronously and serves reads.
    Master,
    /// Receives writes asynchronously and serves reads when the master fails.
    /// Carries the replica's position, starting at zero.
    Replica(usize),
}

/// A physical node: a master cache plus zero or more replicas.
#[derive(Debug)]
pub struct CacheNode<C> {
    id: NodeId,
    master: C,
    replicas: Vec<C>,
}

impl<C> CacheNode<C> {
    /// Creates a node from its caches.
    #[must_use]
    pub fn new(id: NodeId, master: C, replicas: Vec<C>) -> Self {
        Self { id, master, replicas }
    }

    /// Returns the node's identity.
    #[must_use]
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// Returns the master cache.
    #[must_use]
    pub fn master(&self) -> &C {
        &self.master
    }

    /// Returns the replicas in fallback order.
    #[must_use]
    pub fn replicas(&self) -> &[C] {
        &self.replicas
    }

    pub(crate) fn shutdown<K, V>(&self)
    where
        C: NodeCache<K, V>,
    {
        self.master.shutdown();
        for replica in &self.replicas {
            replica.shutdown();
        }
    }
}
