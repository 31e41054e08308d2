// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Consistent hashing and replication for `lanecache`.
//!
//! A [`DistributedCache`] spreads keys over named nodes with a [`HashRing`].
//! Every node is a [`CacheNode`]: a master [`Cache`](lanecache::Cache) that
//! takes writes synchronously and serves reads, plus replicas that are
//! written in the background and only read when the master fails.
//!
//! The design favors availability over consistency. Replication is
//! fire-and-forget, so replicas can serve stale values after a master
//! failure. See [`DistributedCache`] for the exact contract.

mod distributed;
mod node;
mod ring;

#[doc(inline)]
pub use distributed::{DistributedCache, DistributedCacheBuilder};
#[doc(inline)]
pub use node::{CacheNode, NodeCache, Role};
#[doc(inline)]
pub use ring::{DEFAULT_VIRTUAL_NODES, HashRing, NodeId};
