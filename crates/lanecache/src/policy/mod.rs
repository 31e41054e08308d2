// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Read and write policies.
//!
//! A policy decides how a single operation moves data between cache storage
//! and the backing store. Policies are stateless strategies; the cache runs
//! them on the lane that owns the key and handles eviction around them.

mod read;
mod write;

pub use read::{ReadAround, ReadPolicy, ReadThrough};
pub use write::{WriteAround, WritePolicy, WriteThrough};
