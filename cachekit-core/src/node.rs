//! Tagged value domain and cache node.
//!
//! A node's type tag is fixed for its lifetime once created, with exactly
//! one allowed transition: `CounterI64 -> CounterF64` on the first
//! `incr_by_float`. Every other typed operation that disagrees with the
//! current tag fails without mutating the node.

use std::collections::{HashSet, VecDeque};
use std::time::Instant;

/// The result of an increment/decrement, whichever representation the
/// counter currently holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CounterValue {
    I64(i64),
    F64(f64),
}

/// The polymorphic value a node holds. `V` is the caller's opaque payload
/// type; the engine never inspects it except for `Set`'s membership
/// comparisons and `Scalar`'s equality check in `set_nx`.
#[derive(Debug, Clone)]
pub enum Value<V> {
    /// `nx` records whether this scalar was created by `set` (`false`) or
    /// `set_nx` (`true`) — the two calls may not silently overwrite each
    /// other's entries.
    Scalar { value: V, nx: bool },
    CounterI64(i64),
    CounterF64(f64),
    List(VecDeque<V>),
    Set(HashSet<V>),
}

impl<V> Value<V> {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Scalar { .. } => ValueKind::Scalar,
            Value::CounterI64(_) => ValueKind::CounterI64,
            Value::CounterF64(_) => ValueKind::CounterF64,
            Value::List(_) => ValueKind::List,
            Value::Set(_) => ValueKind::Set,
        }
    }
}

/// The tag of a `Value`, independent of its payload — used for quick
/// dispatch checks and logging without borrowing the payload itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Scalar,
    CounterI64,
    CounterF64,
    List,
    Set,
}

/// A single cache entry: its value, optional TTL deadline, derived
/// priority, and the bookkeeping needed to detect stale heap entries.
#[derive(Debug, Clone)]
pub struct CacheNode<V> {
    pub key: String,
    pub value: Value<V>,
    pub deadline: Option<Instant>,
    pub priority: i64,
    /// Sequence number of this node's *current* heap entry. A popped heap
    /// entry whose `seq` no longer matches is stale — this generation tag
    /// is how a tombstoned heap entry is recognized without a random-delete
    /// primitive.
    pub heap_seq: u64,
    /// True once this node has been logically evicted but a stale heap
    /// entry referencing it may still be sitting in the heap. Nodes with
    /// `tombstone = true` are never reachable from the index.
    pub tombstone: bool,
}

impl<V> CacheNode<V> {
    pub fn new(key: String, value: Value<V>, deadline: Option<Instant>, priority: i64, heap_seq: u64) -> Self {
        CacheNode {
            key,
            value,
            deadline,
            priority,
            heap_seq,
            tombstone: false,
        }
    }

    /// True once `deadline` has passed relative to `now`; a key past its
    /// deadline is treated as absent. TTL exactly at `now` counts as
    /// expired.
    pub fn is_expired(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_nx_tag_distinguishes_creator() {
        let set_scalar: Value<i32> = Value::Scalar { value: 1, nx: false };
        let nx_scalar: Value<i32> = Value::Scalar { value: 1, nx: true };
        assert_eq!(set_scalar.kind(), ValueKind::Scalar);
        assert_eq!(nx_scalar.kind(), ValueKind::Scalar);
        match (&set_scalar, &nx_scalar) {
            (Value::Scalar { nx: a, .. }, Value::Scalar { nx: b, .. }) => assert_ne!(a, b),
            _ => unreachable!(),
        }
    }

    #[test]
    fn deadline_at_exactly_now_is_expired() {
        let now = Instant::now();
        let node: CacheNode<i32> = CacheNode::new("k".into(), Value::CounterI64(1), Some(now), 0, 0);
        assert!(node.is_expired(now));
    }

    #[test]
    fn no_deadline_never_expires() {
        let node: CacheNode<i32> = CacheNode::new("k".into(), Value::CounterI64(1), None, 0, 0);
        assert!(!node.is_expired(Instant::now()));
    }
}
