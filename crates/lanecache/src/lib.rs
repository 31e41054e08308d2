// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A bounded, thread-safe read/write-through cache with per-key ordering.
//!
//! A [`Cache`] sits in front of a [`BackingStore`] and keeps the hottest
//! entries in bounded [`CacheStorage`]:
//!
//! - Reads are served from storage when possible and otherwise resolved
//!   through a [`ReadPolicy`](policy::ReadPolicy), read-through by default.
//! - Writes go through a [`WritePolicy`](policy::WritePolicy), write-through by
//!   default, so the backing store stays the system of record.
//! - When storage is full, an [`EvictionPolicy`](eviction::EvictionPolicy)
//!   picks the victim, least recently used by default. Victims stay in the
//!   backing store.
//! - Operations run on [`Lanes`]: a key always maps to the same serial lane,
//!   so operations on one key never overlap or reorder, while different keys
//!   proceed in parallel.
//!
//! # Examples
//!
//! ```
//! use lanecache::Cache;
//! use lanecache_memory::InMemoryStore;
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> lanecache::Result<()> {
//!
//! let cache = Cache::builder::<String, u32>()
//!     .memory(100)
//!     .store(InMemoryStore::with_data([("answer".to_string(), 42)]))
//!     .build()?;
//!
//! // Not cached yet: loaded from the store and cached on the way.
//! assert_eq!(cache.access(&"answer".to_string()).await?, 42);
//! assert!(cache.contains(&"answer".to_string()));
//!
//! // Issued after the update, so it observes the new value.
//! let update = cache.update(&"answer".to_string(), 43);
//! let access = cache.access(&"answer".to_string());
//! update.await?;
//! assert_eq!(access.await?, 43);
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - `metrics`: records OpenTelemetry metrics through `CacheBuilder::metrics`.

mod builder;
mod cache;
pub mod eviction;
mod lanes;
pub mod policy;
mod residency;
mod telemetry;

#[doc(inline)]
pub use builder::CacheBuilder;
#[doc(inline)]
pub use cache::{Cache, CacheName};
#[doc(inline)]
pub use lanecache_tier::{BackingStore, CacheStorage, Error, ErrorKind, Result};
#[doc(inline)]
pub use lanes::{Completion, Lanes};
