// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! In-memory implementations of the `lanecache` storage seams.
//!
//! - [`InMemoryStorage`]: a bounded, concurrent map used as the hot cache tier.
//! - [`InMemoryStore`]: an unbounded, concurrent map that simulates the durable
//!   backing store. It never fails, which makes it the reference collaborator
//!   for tests and demos.
//!
//! # Quick Start
//!
//! ```
//! use lanecache_memory::{InMemoryStorage, InMemoryStore};
//! use lanecache_tier::{BackingStore, CacheStorage};
//! # futures::executor::block_on(async {
//!
//! let storage = InMemoryStorage::<String, i32>::with_capacity(2)?;
//! storage.put("key".to_string(), 42)?;
//! assert_eq!(storage.get(&"key".to_string())?, Some(42));
//!
//! let store = InMemoryStore::with_data([("db".to_string(), 7)]);
//! assert_eq!(store.read(&"db".to_string()).await?, Some(7));
//! # Ok::<(), lanecache_tier::Error>(())
//! # });
//! ```

pub mod storage;
pub mod store;

#[doc(inline)]
pub use storage::InMemoryStorage;
#[doc(inline)]
pub use store::InMemoryStore;
