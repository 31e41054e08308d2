// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Consistent hash ring.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
    hash::Hash,
    sync::Arc,
};

use lanecache_tier::{Error, Result, stable_hash};
use xxhash_rust::xxh3::xxh3_64;

/// Ring points per node when none are configured.
pub const DEFAULT_VIRTUAL_NODES: usize = 160;

/// Opaque identity of a physical node, such as `"10.0.0.7:6379"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Creates a node identity.
    #[must_use]
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Returns the identity as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Maps keys to nodes so that membership changes move as few keys as possible.
///
/// Each node occupies `virtual_nodes` points on a 64-bit ring. A key belongs
/// to the node owning the first point at or after the key's hash, wrapping
/// around to the lowest point. Adding a node only takes keys away from other
/// nodes; removing one only hands its keys to the next points along the ring.
///
/// Routing is deterministic across processes: points and keys are hashed with
/// xxh3, not with a randomly seeded hasher.
///
/// # Examples
///
/// ```
/// use lanecache_ring::{HashRing, NodeId};
///
/// let mut ring = HashRing::new(64)?;
/// ring.add_node(NodeId::from("cache-a"));
/// ring.add_node(NodeId::from("cache-b"));
///
/// let owner = ring.route("user:42").cloned();
/// assert!(owner.is_some());
/// assert_eq!(ring.route("user:42").cloned(), owner);
/// # Ok::<(), lanecache_tier::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct HashRing {
    virtual_nodes: usize,
    points: BTreeMap<u64, NodeId>,
    nodes: BTreeSet<NodeId>,
}

impl HashRing {
    /// Creates an empty ring placing `virtual_nodes` points per node.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::CapacityInvariant`](lanecache_tier::ErrorKind::CapacityInvariant)
    /// if `virtual_nodes` is zero.
    pub fn new(virtual_nodes: usize) -> Result<Self> {
        if virtual_nodes == 0 {
            return Err(Error::invalid_config("a node needs at least one virtual node"));
        }

        Ok(Self {
            virtual_nodes,
            points: BTreeMap::new(),
            nodes: BTreeSet::new(),
        })
    }

    /// Returns the number of points each node places on the ring.
    #[must_use]
    pub fn virtual_nodes(&self) -> usize {
        self.virtual_nodes
    }

    /// Adds `node`. Returns `false` if it was already a member.
    pub fn add_node(&mut self, node: NodeId) -> bool {
        if self.nodes.contains(&node) {
            return false;
        }

        for point in self.points_of(&node) {
            // On a collision the earlier owner keeps the point.
            self.points.entry(point).or_insert_with(|| node.clone());
        }
        self.nodes.insert(node);
        true
    }

    /// Removes `node`. Returns `false` if it was not a member.
    pub fn remove_node(&mut self, node: &NodeId) -> bool {
        if !self.nodes.remove(node) {
            return false;
        }

        for point in self.points_of(node) {
            if self.points.get(&point) == Some(node) {
                self.points.remove(&point);
            }
        }
        true
    }

    /// Returns the node owning `key`, or `None` if the ring is empty.
    #[must_use]
    pub fn route<Q: Hash + ?Sized>(&self, key: &Q) -> Option<&NodeId> {
        self.route_hash(stable_hash(key))
    }

    fn route_hash(&self, hash: u64) -> Option<&NodeId> {
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, node)| node)
    }

    /// Returns `true` if `node` is a member.
    #[must_use]
    pub fn contains(&self, node: &NodeId) -> bool {
        self.nodes.contains(node)
    }

    /// Iterates over the member nodes in identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter()
    }

    /// Returns the number of member nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the ring has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn points_of(&self, node: &NodeId) -> impl Iterator<Item = u64> + use<> {
        let node = node.clone();
        (0..self.virtual_nodes).map(move |i| xxh3_64(format!("{node}#{i}").as_bytes()))
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self {
            virtual_nodes: DEFAULT_VIRTUAL_NODES,
            points: BTreeMap::new(),
            nodes: BTreeSet::new(),
        }
    }
}
