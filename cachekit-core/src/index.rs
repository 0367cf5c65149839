//! Ordered index.
//!
//! A thin wrapper over `BTreeMap`, used as an opaque ordered associative
//! container. No operation here relies on traversal order beyond the
//! sweeper's full scan and test assertions.

use std::collections::BTreeMap;

use crate::node::CacheNode;

pub struct OrderedIndex<V> {
    map: BTreeMap<String, CacheNode<V>>,
}

impl<V> OrderedIndex<V> {
    pub fn new() -> Self {
        OrderedIndex { map: BTreeMap::new() }
    }

    pub fn find(&self, key: &str) -> Option<&CacheNode<V>> {
        self.map.get(key)
    }

    pub fn find_mut(&mut self, key: &str) -> Option<&mut CacheNode<V>> {
        self.map.get_mut(key)
    }

    pub fn insert(&mut self, node: CacheNode<V>) -> Option<CacheNode<V>> {
        self.map.insert(node.key.clone(), node)
    }

    pub fn delete(&mut self, key: &str) -> Option<CacheNode<V>> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Full key enumeration, used by the sweeper's scan. Order is the
    /// index's own key order; no caller relies on a particular order beyond
    /// determinism within a single snapshot.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|k| k.as_str())
    }
}

impl<V> Default for OrderedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Value;

    fn node(key: &str) -> CacheNode<i32> {
        CacheNode::new(key.to_string(), Value::CounterI64(0), None, 0, 0)
    }

    #[test]
    fn insert_then_find() {
        let mut idx = OrderedIndex::new();
        idx.insert(node("a"));
        assert!(idx.find("a").is_some());
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn delete_removes_and_returns() {
        let mut idx = OrderedIndex::new();
        idx.insert(node("a"));
        let removed = idx.delete("a");
        assert!(removed.is_some());
        assert!(idx.is_empty());
    }

    #[test]
    fn replace_returns_previous_node() {
        let mut idx = OrderedIndex::new();
        idx.insert(node("a"));
        let prev = idx.insert(node("a"));
        assert!(prev.is_some());
        assert_eq!(idx.len(), 1);
    }
}
