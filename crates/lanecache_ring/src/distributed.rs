// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Consistent-hashing front end over several cache nodes.

use std::{collections::HashMap, fmt::Debug, hash::Hash, marker::PhantomData, sync::Arc};

use lanecache_tier::{Error, ErrorKind, Result};
use parking_lot::RwLock;
use tokio::runtime::Handle;

use crate::{CacheNode, HashRing, NodeCache, NodeId, Role, ring::DEFAULT_VIRTUAL_NODES};

type NodeFactory<C> = Box<dyn Fn(&NodeId, Role) -> Result<C> + Send + Sync>;

struct Membership<C> {
    ring: HashRing,
    nodes: HashMap<NodeId, Arc<CacheNode<C>>>,
}

/// Routes keys to cache nodes and replicates writes to each node's replicas.
///
/// # Consistency
///
/// A [`put`](Self::put) completes once the owning node's master has taken the
/// write. Replicas receive the write in the background; their failures are
/// logged and not retried, so a replica may lag its master or miss writes
/// entirely. A [`get`](Self::get) reads the master and only falls back to the
/// replicas, in order, when the master fails, so a fallback read may return
/// stale data. There is no read repair and no quorum.
///
/// # Examples
///
/// ```
/// use lanecache::Cache;
/// use lanecache_ring::DistributedCache;
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> lanecache::Result<()> {
///
/// let cache: DistributedCache<String, u32, _> = DistributedCache::builder(|_node, _role| Cache::builder::<String, u32>().memory(100).build())
///     .replicas(1)
///     .node("cache-a")
///     .node("cache-b")
///     .build()?;
///
/// cache.put(&"hits".to_string(), 1).await?;
/// assert_eq!(cache.get(&"hits".to_string()).await?, 1);
/// # Ok(())
/// # }
/// ```
pub struct DistributedCache<K, V, C> {
    membership: RwLock<Membership<C>>,
    factory: NodeFactory<C>,
    replicas: usize,
    runtime: Handle,
    _types: PhantomData<fn(K) -> V>,
}

impl DistributedCache<(), (), ()> {
    /// Starts building a distributed cache whose node caches come from `factory`.
    ///
    /// The factory is called once per node and role: for the master and for
    /// every replica. Whether those caches share a backing store is up to it.
    pub fn builder<K, V, C, F>(factory: F) -> DistributedCacheBuilder<K, V, C>
    where
        F: Fn(&NodeId, Role) -> Result<C> + Send + Sync + 'static,
    {
        DistributedCacheBuilder {
            factory: Box::new(factory),
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            replicas: 0,
            nodes: Vec::new(),
            runtime: None,
            _types: PhantomData,
        }
    }
}

impl<K, V, C> DistributedCache<K, V, C>
where
    K: Clone + Hash + Send + Sync + 'static,
    V: Clone + Send + 'static,
    C: NodeCache<K, V> + Clone,
{
    /// Writes `value` to the node owning `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NoNodes`] if the cache has no nodes, or the
    /// master's error if it rejected the write. Replica failures are not
    /// reported here.
    pub async fn put(&self, key: &K, value: V) -> Result<()> {
        let node = self.owner(key)?;
        node.master().put(key, value.clone()).await?;

        for (index, replica) in node.replicas().iter().enumerate() {
            let replication = replica.put(key, value.clone());
            let id = node.id().clone();
            self.runtime.spawn(async move {
                if let Err(error) = replication.await {
                    tracing::warn!(node = %id, replica = index, %error, "replication failed");
                }
            });
        }

        Ok(())
    }

    /// Reads `key` from the node owning it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NoNodes`] if the cache has no nodes, the master's
    /// [`ErrorKind::NotFound`] if the key does not exist, and `NotFound` if
    /// the master failed and no replica could serve the key either.
    pub async fn get(&self, key: &K) -> Result<V> {
        let node = self.owner(key)?;

        let error = match node.master().get(key).await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_not_found() => return Err(error),
            Err(error) => error,
        };

        tracing::info!(node = %node.id(), %error, "master read failed, falling back to replicas");
        for (index, replica) in node.replicas().iter().enumerate() {
            match replica.get(key).await {
                Ok(value) => return Ok(value),
                Err(error) => tracing::debug!(node = %node.id(), replica = index, %error, "replica read failed"),
            }
        }

        tracing::warn!(node = %node.id(), replicas = node.replicas().len(), "no replica could serve the read");
        Err(Error::not_found())
    }

    /// Adds a node, creating its caches through the factory.
    ///
    /// Returns `false` if the node was already a member. Keys that move to
    /// the new node start out uncached there.
    ///
    /// # Errors
    ///
    /// Returns the factory's error; membership is unchanged in that case.
    pub fn add_node(&self, id: impl Into<NodeId>) -> Result<bool> {
        let id = id.into();
        if self.membership.read().nodes.contains_key(&id) {
            return Ok(false);
        }

        let node = Arc::new(self.create_node(id.clone())?);

        let mut membership = self.membership.write();
        if membership.nodes.contains_key(&id) {
            drop(membership);
            node.shutdown::<K, V>();
            return Ok(false);
        }
        membership.ring.add_node(id.clone());
        membership.nodes.insert(id.clone(), node);
        drop(membership);

        tracing::info!(node = %id, "node joined");
        Ok(true)
    }

    /// Removes a node and shuts its caches down.
    ///
    /// Returns `false` if the node was not a member.
    pub fn remove_node(&self, id: &NodeId) -> bool {
        let removed = {
            let mut membership = self.membership.write();
            membership.ring.remove_node(id);
            membership.nodes.remove(id)
        };

        match removed {
            Some(node) => {
                node.shutdown::<K, V>();
                tracing::info!(node = %id, "node left");
                true
            }
            None => false,
        }
    }

    /// Returns the node owning `key`, or `None` without nodes.
    #[must_use]
    pub fn node_for(&self, key: &K) -> Option<NodeId> {
        self.membership.read().ring.route(key).cloned()
    }

    /// Returns the node with identity `id`.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<Arc<CacheNode<C>>> {
        self.membership.read().nodes.get(id).cloned()
    }

    /// Returns the member nodes in identity order.
    #[must_use]
    pub fn nodes(&self) -> Vec<NodeId> {
        self.membership.read().ring.nodes().cloned().collect()
    }

    /// Returns the number of replicas per node.
    #[must_use]
    pub fn replica_count(&self) -> usize {
        self.replicas
    }

    /// Shuts down every node's caches. Later operations fail with
    /// [`ErrorKind::Shutdown`]. Idempotent.
    pub fn shutdown(&self) {
        for node in self.membership.read().nodes.values() {
            node.shutdown::<K, V>();
        }
    }

    fn owner(&self, key: &K) -> Result<Arc<CacheNode<C>>> {
        let membership = self.membership.read();
        membership
            .ring
            .route(key)
            .and_then(|id| membership.nodes.get(id))
            .cloned()
            .ok_or_else(|| ErrorKind::NoNodes.into())
    }

    fn create_node(&self, id: NodeId) -> Result<CacheNode<C>> {
        let master = (self.factory)(&id, Role::Master)?;
        let replicas = (0..self.replicas)
            .map(|index| (self.factory)(&id, Role::Replica(index)))
            .collect::<Result<Vec<_>>>()?;
        Ok(CacheNode::new(id, master, replicas))
    }
}

impl<K, V, C> Debug for DistributedCache<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let membership = self.membership.read();
        f.debug_struct("DistributedCache")
            .field("nodes", &membership.ring.len())
            .field("virtual_nodes", &membership.ring.virtual_nodes())
            .field("replicas", &self.replicas)
            .finish_non_exhaustive()
    }
}

/// Builder for [`DistributedCache`].
///
/// Defaults: 160 virtual nodes per node, no replicas, no nodes, the current
/// Tokio runtime for background replication.
pub struct DistributedCacheBuilder<K, V, C> {
    factory: NodeFactory<C>,
    virtual_nodes: usize,
    replicas: usize,
    nodes: Vec<NodeId>,
    runtime: Option<Handle>,
    _types: PhantomData<fn(K) -> V>,
}

impl<K, V, C> DistributedCacheBuilder<K, V, C> {
    /// Sets how many ring points each node occupies. More points spread keys
    /// more evenly.
    #[must_use]
    pub fn virtual_nodes(mut self, virtual_nodes: usize) -> Self {
        self.virtual_nodes = virtual_nodes;
        self
    }

    /// Sets how many replicas each node keeps besides its master.
    #[must_use]
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    /// Adds a node.
    #[must_use]
    pub fn node(mut self, id: impl Into<NodeId>) -> Self {
        self.nodes.push(id.into());
        self
    }

    /// Runs background replication on `runtime` instead of the current runtime.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }
}

impl<K, V, C> DistributedCacheBuilder<K, V, C>
where
    K: Clone + Hash + Send + Sync + 'static,
    V: Clone + Send + 'static,
    C: NodeCache<K, V> + Clone,
{
    /// Builds the cache, creating every configured node.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityInvariant`] if `virtual_nodes` is zero or
    /// no runtime was given and none is current, and any error of the factory.
    pub fn build(self) -> Result<DistributedCache<K, V, C>> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| Error::invalid_config(format!("cannot replicate writes: {e}")))?,
        };

        let cache = DistributedCache {
            membership: RwLock::new(Membership {
                ring: HashRing::new(self.virtual_nodes)?,
                nodes: HashMap::new(),
            }),
            factory: self.factory,
            replicas: self.replicas,
            runtime,
            _types: PhantomData,
        };

        for id in self.nodes {
            if let Err(error) = cache.add_node(id) {
                cache.shutdown();
                return Err(error);
            }
        }

        Ok(cache)
    }
}

impl<K, V, C> Debug for DistributedCacheBuilder<K, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistributedCacheBuilder")
            .field("virtual_nodes", &self.virtual_nodes)
            .field("replicas", &self.replicas)
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}
