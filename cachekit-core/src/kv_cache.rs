//! The outer contract shared by both eviction engines, so a host process
//! can hold a `Box<dyn KvCache<V>>` and swap the priority engine for the
//! LRU alternative without touching call sites.

use std::hash::Hash;

use cachekit_common::CacheContext;
use cachekit_common::CacheResult;

use crate::node::CounterValue;

/// Outcome of a `delete` batch: how many keys were actually removed, and
/// whether the batch stopped early because its `CacheContext` was
/// cancelled. Kept as a dedicated struct rather than threading the count
/// through the `Err` case, since a `Result` cannot carry both a partial
/// success value and an error at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: usize,
    pub cancelled: bool,
}

/// Redis-like operations over a single in-process cache, implemented by
/// both the priority engine (`PriorityCache`) and the LRU alternative
/// (`LruCache`).
pub trait KvCache<V>: Send + Sync
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Create-or-replace a scalar; resets deadline and priority. `ttl ==
    /// Duration::ZERO` means no expiration.
    fn set(&self, key: &str, value: V, ttl: std::time::Duration) -> CacheResult<()>;

    /// Sets only if absent (or expired); refreshes TTL without mutating the
    /// value when called again with an equal value.
    fn set_nx(&self, key: &str, value: V, ttl: std::time::Duration) -> CacheResult<bool>;

    fn get(&self, key: &str) -> CacheResult<V>;

    /// Atomically swaps a scalar; `Ok(None)` means the key was absent or
    /// expired (a fresh entry was created with the default TTL).
    fn get_set(&self, key: &str, value: V) -> CacheResult<Option<V>>;

    /// Deletes each present key in order; an already-cancelled `ctx`
    /// returns immediately with no work done.
    fn delete(&self, ctx: &CacheContext, keys: &[&str]) -> CacheResult<DeleteOutcome>;

    fn lpush(&self, key: &str, values: Vec<V>) -> CacheResult<usize>;

    fn lpop(&self, key: &str) -> CacheResult<V>;

    fn sadd(&self, key: &str, members: Vec<V>) -> CacheResult<usize>;

    fn srem(&self, key: &str, members: &[V]) -> CacheResult<usize>;

    fn incr_by(&self, key: &str, delta: i64) -> CacheResult<CounterValue>;

    fn decr_by(&self, key: &str, delta: i64) -> CacheResult<CounterValue>;

    fn incr_by_float(&self, key: &str, delta: f64) -> CacheResult<f64>;

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops the background sweeper. Idempotent.
    fn close(&self);
}
