// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Least-recently-used eviction.
//!
//! Recency lives in a doubly-linked list laid out in a node arena, with a
//! hash index from key to node. Every operation is O(1): no scan of the
//! list happens on access, eviction or removal.

use std::{collections::HashMap, hash::Hash};

use parking_lot::Mutex;

use super::EvictionPolicy;

type NodeIndex = usize;

const NULL_INDEX: NodeIndex = NodeIndex::MAX;

#[derive(Debug)]
struct LruNode<K> {
    key: Option<K>,
    prev: NodeIndex,
    next: NodeIndex,
}

impl<K> LruNode<K> {
    const fn vacant(next: NodeIndex) -> Self {
        Self {
            key: None,
            prev: NULL_INDEX,
            next,
        }
    }
}

/// Recency list. The head is the most recently used key, the tail the least.
#[derive(Debug)]
struct LruList<K> {
    nodes: Vec<LruNode<K>>,
    index: HashMap<K, NodeIndex>,
    head: Option<NodeIndex>,
    tail: Option<NodeIndex>,
    free_head: Option<NodeIndex>,
}

impl<K: Clone + Eq + Hash> LruList<K> {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            head: None,
            tail: None,
            free_head: None,
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn alloc_node(&mut self, key: K) -> NodeIndex {
        let node = LruNode {
            key: Some(key),
            prev: NULL_INDEX,
            next: NULL_INDEX,
        };

        match self.free_head {
            Some(idx) => {
                let next_free = self.nodes[idx].next;
                self.free_head = (next_free != NULL_INDEX).then_some(next_free);
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn free_node(&mut self, idx: NodeIndex) -> Option<K> {
        let vacant = LruNode::vacant(self.free_head.unwrap_or(NULL_INDEX));
        let freed = std::mem::replace(&mut self.nodes[idx], vacant);
        self.free_head = Some(idx);
        freed.key
    }

    fn unlink(&mut self, idx: NodeIndex) {
        let LruNode { prev, next, .. } = self.nodes[idx];

        if prev == NULL_INDEX {
            self.head = (next != NULL_INDEX).then_some(next);
        } else {
            self.nodes[prev].next = next;
        }

        if next == NULL_INDEX {
            self.tail = (prev != NULL_INDEX).then_some(prev);
        } else {
            self.nodes[next].prev = prev;
        }

        self.nodes[idx].prev = NULL_INDEX;
        self.nodes[idx].next = NULL_INDEX;
    }

    fn push_front(&mut self, idx: NodeIndex) {
        if let Some(old_head) = self.head {
            self.nodes[idx].next = old_head;
            self.nodes[old_head].prev = idx;
        }
        self.head = Some(idx);

        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn push_back(&mut self, idx: NodeIndex) {
        if let Some(old_tail) = self.tail {
            self.nodes[idx].prev = old_tail;
            self.nodes[old_tail].next = idx;
        }
        self.tail = Some(idx);

        if self.head.is_none() {
            self.head = Some(idx);
        }
    }

    fn touch(&mut self, key: &K) {
        if let Some(&idx) = self.index.get(key) {
            if self.head != Some(idx) {
                self.unlink(idx);
                self.push_front(idx);
            }
            return;
        }

        let idx = self.alloc_node(key.clone());
        self.push_front(idx);
        self.index.insert(key.clone(), idx);
    }

    fn restore(&mut self, key: &K) {
        if let Some(&idx) = self.index.get(key) {
            if self.tail != Some(idx) {
                self.unlink(idx);
                self.push_back(idx);
            }
            return;
        }

        let idx = self.alloc_node(key.clone());
        self.push_back(idx);
        self.index.insert(key.clone(), idx);
    }

    fn remove(&mut self, key: &K) {
        if let Some(idx) = self.index.remove(key) {
            self.unlink(idx);
            self.free_node(idx);
        }
    }

    fn pop_back(&mut self) -> Option<K> {
        let idx = self.tail?;
        self.unlink(idx);
        let key = self.free_node(idx)?;
        self.index.remove(&key);
        Some(key)
    }

    fn clear(&mut self) {
        *self = Self::new();
    }

    #[cfg(test)]
    fn keys_by_recency(&self) -> Vec<K> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            let node = &self.nodes[idx];
            keys.extend(node.key.clone());
            cursor = (node.next != NULL_INDEX).then_some(node.next);
        }
        keys
    }
}

/// Evicts the key that was used least recently.
///
/// Tracks an unbounded number of keys; the cache keeps the tracked set equal
/// to the set of resident entries.
///
/// # Examples
///
/// ```
/// use lanecache::eviction::{EvictionPolicy, LruPolicy};
///
/// let lru = LruPolicy::new();
/// lru.key_accessed(&"A");
/// lru.key_accessed(&"B");
/// lru.key_accessed(&"A");
///
/// assert_eq!(lru.evict_key(), Some("B"));
/// assert_eq!(lru.evict_key(), Some("A"));
/// assert_eq!(lru.evict_key(), None);
/// ```
#[derive(Debug)]
pub struct LruPolicy<K> {
    list: Mutex<LruList<K>>,
}

impl<K: Clone + Eq + Hash> LruPolicy<K> {
    /// Creates an empty LRU policy.
    #[must_use]
    pub fn new() -> Self {
        Self {
            list: Mutex::new(LruList::new()),
        }
    }
}

impl<K: Clone + Eq + Hash> Default for LruPolicy<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for LruPolicy<K>
where
    K: Clone + Eq + Hash + Send,
{
    fn key_accessed(&self, key: &K) {
        self.list.lock().touch(key);
    }

    fn evict_key(&self) -> Option<K> {
        self.list.lock().pop_back()
    }

    fn key_restored(&self, key: &K) {
        self.list.lock().restore(key);
    }

    fn key_removed(&self, key: &K) {
        self.list.lock().remove(key);
    }

    fn clear(&self) {
        self.list.lock().clear();
    }

    fn len(&self) -> usize {
        self.list.lock().len()
    }
}
