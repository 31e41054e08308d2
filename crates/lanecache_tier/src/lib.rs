// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Core abstractions shared by every layer of `lanecache`.
//!
//! This crate defines the two storage seams the cache orchestrator composes:
//!
//! - [`CacheStorage`]: a bounded, synchronous, in-process key/value container.
//!   It never evicts on its own; the orchestrator decides what leaves.
//! - [`BackingStore`]: the durable system of record. Operations are async and
//!   may fail, so a real database client is a drop-in replacement for the
//!   simulated store shipped in `lanecache_memory`.
//!
//! Both seams report failures through the shared [`Error`] type.
//!
//! # Implementing a Backing Store
//!
//! ```
//! use std::collections::HashMap;
//! use std::sync::Mutex;
//!
//! use lanecache_tier::{BackingStore, Error, Result};
//!
//! struct Table(Mutex<HashMap<String, String>>);
//!
//! impl BackingStore<String, String> for Table {
//!     async fn read(&self, key: &String) -> Result<Option<String>> {
//!         let rows = self.0.lock().map_err(|e| Error::storage_fault(e.to_string()))?;
//!         Ok(rows.get(key).cloned())
//!     }
//!
//!     async fn write(&self, key: &String, value: String) -> Result<()> {
//!         let mut rows = self.0.lock().map_err(|e| Error::storage_fault(e.to_string()))?;
//!         rows.insert(key.clone(), value);
//!         Ok(())
//!     }
//!
//!     async fn delete(&self, key: &String) -> Result<()> {
//!         let mut rows = self.0.lock().map_err(|e| Error::storage_fault(e.to_string()))?;
//!         rows.remove(key);
//!         Ok(())
//!     }
//! }
//! ```

pub mod error;
mod hashing;
mod storage;
mod store;
#[cfg(any(feature = "test-util", test))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-util")))]
pub mod testing;

#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use hashing::stable_hash;
#[doc(inline)]
pub use storage::CacheStorage;
#[doc(inline)]
pub use store::BackingStore;
