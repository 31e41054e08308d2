// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Routing, replication and fallback of the distributed cache.

use std::{collections::HashMap, sync::Arc, time::Duration};

use lanecache::{Cache, Error, ErrorKind, Result};
use lanecache_memory::InMemoryStorage;
use lanecache_ring::{DistributedCache, NodeId, Role};
use lanecache_tier::testing::{MockStore, StoreOp};
use parking_lot::Mutex;

type Member = Cache<String, u32, InMemoryStorage<String, u32>, MockStore<String, u32>>;

/// Remembers the store behind every cache the factory created.
#[derive(Clone, Default)]
struct Stores(Arc<Mutex<HashMap<(NodeId, Role), MockStore<String, u32>>>>);

impl Stores {
    fn get(&self, node: &NodeId, role: Role) -> MockStore<String, u32> {
        self.0.lock().get(&(node.clone(), role)).cloned().expect("store was created")
    }

    fn factory(&self) -> impl Fn(&NodeId, Role) -> Result<Member> + Send + Sync + 'static {
        let stores = self.clone();
        move |node: &NodeId, role: Role| {
            let store = MockStore::new();
            stores.0.lock().insert((node.clone(), role), store.clone());
            Cache::builder::<String, u32>().memory(64).lanes(2).store(store).build()
        }
    }
}

fn cluster(stores: &Stores, replicas: usize) -> Result<DistributedCache<String, u32, Member>> {
    DistributedCache::builder(stores.factory())
        .virtual_nodes(32)
        .replicas(replicas)
        .node("a")
        .node("b")
        .node("c")
        .build()
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not met in time");
}

fn key(i: u32) -> String {
    format!("key-{i}")
}

#[tokio::test]
async fn writes_land_on_the_owning_master() -> Result<()> {
    let stores = Stores::default();
    let cache = cluster(&stores, 0)?;

    for i in 0..30 {
        cache.put(&key(i), i).await?;
    }

    for i in 0..30 {
        let owner = cache.node_for(&key(i)).expect("cluster has nodes");
        for node in cache.nodes() {
            let held = stores.get(&node, Role::Master).peek(&key(i));
            assert_eq!(held.is_some(), node == owner, "{} on {node}", key(i));
        }
        assert_eq!(cache.get(&key(i)).await?, i);
    }
    Ok(())
}

#[tokio::test]
async fn replicas_receive_writes_in_the_background() -> Result<()> {
    let stores = Stores::default();
    let cache = cluster(&stores, 2)?;
    assert_eq!(cache.replica_count(), 2);

    cache.put(&key(1), 10).await?;

    let owner = cache.node_for(&key(1)).expect("cluster has nodes");
    let replicas = [stores.get(&owner, Role::Replica(0)), stores.get(&owner, Role::Replica(1))];
    eventually(|| replicas.iter().all(|store| store.peek(&key(1)) == Some(10))).await;
    Ok(())
}

#[tokio::test]
async fn failed_master_read_falls_back_to_replicas() -> Result<()> {
    let stores = Stores::default();
    let cache = cluster(&stores, 2)?;
    cache.put(&key(7), 70).await?;

    let owner = cache.node_for(&key(7)).expect("cluster has nodes");
    let second = stores.get(&owner, Role::Replica(1));
    eventually(|| second.peek(&key(7)) == Some(70)).await;

    // The master loses its cached copy and its store starts failing; replica 0 is down too.
    let node = cache.node(&owner).expect("owner is a member");
    node.master().invalidate(&key(7)).await?;
    stores.get(&owner, Role::Master).fail_when(|op| matches!(op, StoreOp::Read(_)));
    node.replicas()[0].shutdown();

    assert_eq!(cache.get(&key(7)).await?, 70);
    Ok(())
}

#[tokio::test]
async fn replica_fallback_can_return_stale_values() -> Result<()> {
    let stores = Stores::default();
    let cache = cluster(&stores, 1)?;
    let owner = cache.node_for(&key(3)).expect("cluster has nodes");
    let replica = stores.get(&owner, Role::Replica(0));

    cache.put(&key(3), 1).await?;
    eventually(|| replica.peek(&key(3)) == Some(1)).await;

    // Replication of the second write fails and is only logged.
    replica.fail_when(|op| matches!(op, StoreOp::Write { .. }));
    cache.put(&key(3), 2).await?;
    eventually(|| replica.operations().contains(&StoreOp::Write { key: key(3), value: 2 })).await;
    assert_eq!(cache.get(&key(3)).await?, 2);

    let node = cache.node(&owner).expect("owner is a member");
    node.master().invalidate(&key(3)).await?;
    stores.get(&owner, Role::Master).fail_when(|op| matches!(op, StoreOp::Read(_)));

    // No read repair and no quorum: the replica answers with the old value.
    assert_eq!(cache.get(&key(3)).await?, 1);
    Ok(())
}

#[tokio::test]
async fn failure_everywhere_reads_as_not_found() -> Result<()> {
    let stores = Stores::default();
    let cache = cluster(&stores, 1)?;
    cache.put(&key(5), 5).await?;

    let owner = cache.node_for(&key(5)).expect("cluster has nodes");
    let node = cache.node(&owner).expect("owner is a member");
    node.master().shutdown();
    node.replicas()[0].shutdown();

    assert!(cache.get(&key(5)).await.expect_err("nothing can serve").is_not_found());
    Ok(())
}

#[tokio::test]
async fn missing_keys_do_not_consult_replicas() -> Result<()> {
    let stores = Stores::default();
    let cache = cluster(&stores, 1)?;

    assert!(cache.get(&key(99)).await.expect_err("never written").is_not_found());

    let owner = cache.node_for(&key(99)).expect("cluster has nodes");
    assert!(stores.get(&owner, Role::Replica(0)).operations().is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_cluster_has_no_nodes() -> Result<()> {
    let stores = Stores::default();
    let cache: DistributedCache<String, u32, Member> = DistributedCache::builder(stores.factory()).build()?;

    let error = cache.put(&key(1), 1).await.expect_err("no nodes");
    assert!(matches!(error.kind(), ErrorKind::NoNodes));
    let error = cache.get(&key(1)).await.expect_err("no nodes");
    assert!(matches!(error.kind(), ErrorKind::NoNodes));
    assert_eq!(cache.node_for(&key(1)), None);
    Ok(())
}

#[tokio::test]
async fn membership_changes_reroute_keys() -> Result<()> {
    let stores = Stores::default();
    let cache = cluster(&stores, 0)?;

    assert!(!cache.add_node("a")?);
    assert!(cache.add_node("d")?);
    assert_eq!(cache.nodes().len(), 4);

    let leaving = NodeId::from("b");
    let orphan = (0..1_000).map(key).find(|k| cache.node_for(k).as_ref() == Some(&leaving)).expect("b owns some key");
    let departed = cache.node(&leaving).expect("b is a member");

    assert!(cache.remove_node(&leaving));
    assert!(!cache.remove_node(&leaving));
    assert_ne!(cache.node_for(&orphan), Some(leaving));

    // The new owner starts cold, the departed node no longer accepts work.
    cache.put(&orphan, 1).await?;
    assert_eq!(cache.get(&orphan).await?, 1);
    let error = departed.master().access(&orphan).await.expect_err("departed node is shut down");
    assert!(matches!(error.kind(), ErrorKind::Shutdown));
    Ok(())
}

#[tokio::test]
async fn factory_errors_fail_the_build() {
    let error = DistributedCache::builder::<String, u32, _, _>(|node: &NodeId, _role| {
        if node.as_str() == "broken" {
            return Err(Error::invalid_config("bad node"));
        }
        Cache::builder::<String, u32>().memory(1).build()
    })
    .node("fine")
    .node("broken")
    .build()
    .expect_err("factory fails");

    assert!(matches!(error.kind(), ErrorKind::CapacityInvariant(_)));
}

#[tokio::test]
async fn zero_virtual_nodes_fail_the_build() {
    let stores = Stores::default();
    let error = DistributedCache::builder::<String, u32, _, _>(stores.factory())
        .virtual_nodes(0)
        .build()
        .expect_err("no ring points");
    assert!(matches!(error.kind(), ErrorKind::CapacityInvariant(_)));
}
