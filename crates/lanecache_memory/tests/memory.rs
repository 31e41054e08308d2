// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the in-memory storage and store.

use std::sync::Arc;

use lanecache_memory::{InMemoryStorage, InMemoryStore};
use lanecache_tier::{BackingStore, CacheStorage, Result};

#[test]
fn storage_clones_share_entries() -> Result<()> {
    let storage = InMemoryStorage::<String, i32>::with_capacity(4)?;
    let clone = storage.clone();

    storage.put("key".to_string(), 1)?;

    assert!(clone.contains_key(&"key".to_string()));
    assert_eq!(clone.capacity(), 4);
    Ok(())
}

#[test]
fn storage_clear_empties_all_entries() -> Result<()> {
    let storage = InMemoryStorage::with_capacity(4)?;
    storage.put(1, 1)?;
    storage.put(2, 2)?;

    storage.clear()?;

    assert!(storage.is_empty());
    Ok(())
}

#[test]
fn storage_never_exceeds_capacity_under_contention() -> Result<()> {
    let storage = Arc::new(InMemoryStorage::with_capacity(8)?);

    std::thread::scope(|scope| {
        for thread in 0..4_u32 {
            let storage = Arc::clone(&storage);
            scope.spawn(move || {
                for i in 0..100_u32 {
                    // Refusals are expected once the storage fills up.
                    let _ = storage.put(thread * 1000 + i, i);
                }
            });
        }
    });

    assert_eq!(storage.len(), 8);
    Ok(())
}

#[tokio::test]
async fn store_round_trips_and_deletes() -> Result<()> {
    let store = InMemoryStore::<String, String>::new();
    assert!(store.is_empty());

    store.write(&"A".to_string(), "Apple".to_string()).await?;
    assert_eq!(store.read(&"A".to_string()).await?, Some("Apple".to_string()));

    store.delete(&"A".to_string()).await?;
    assert_eq!(store.read(&"A".to_string()).await?, None);
    assert!(!store.contains_key(&"A".to_string()));
    Ok(())
}

#[tokio::test]
async fn store_delete_of_missing_key_is_noop() -> Result<()> {
    let store = InMemoryStore::with_data([(1, "one")]);
    store.delete(&2).await?;
    assert_eq!(store.len(), 1);
    Ok(())
}
