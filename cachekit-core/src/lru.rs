//! Self-contained LRU alternative engine: a dense node arena with a
//! free-list and an intrusive doubly linked list threaded through
//! head/tail indices instead of heap pointers, behind a single lock and
//! an entry-count capacity.
//!
//! Unlike `PriorityCache`, eviction order here is fixed (pure
//! least-recently-used); there is no configurable priority mode, no
//! min-heap, and no tombstoned stale-handle problem to solve, since the
//! intrusive list is always kept in a consistent state under the same
//! lock that performs lookups.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};

use cachekit_common::{CacheContext, CacheError, CacheResult, TypeMismatchKind};

use crate::config::LruConfig;
use crate::kv_cache::{DeleteOutcome, KvCache};
use crate::node::{CounterValue, Value};
use crate::sweeper::Sweeper;

struct LruNode<V> {
    key: String,
    value: Value<V>,
    deadline: Option<Instant>,
    prev: Option<usize>,
    next: Option<usize>,
}

impl<V> LruNode<V> {
    fn is_expired(&self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// Dense node arena plus an index-based LRU list, guarded by a single
/// unsharded lock.
struct LruInner<V> {
    map: HashMap<String, usize, RandomState>,
    nodes: Vec<Option<LruNode<V>>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity_limit: usize,
    eviction_callback: Option<Arc<dyn Fn(&str, &Value<V>) + Send + Sync>>,
}

impl<V> LruInner<V> {
    fn new(capacity_limit: usize, eviction_callback: Option<Arc<dyn Fn(&str, &Value<V>) + Send + Sync>>) -> Self {
        LruInner {
            map: HashMap::with_hasher(RandomState::new()),
            nodes: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity_limit,
            eviction_callback,
        }
    }

    fn lru_remove(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.nodes[idx].as_ref().expect("node exists");
            (node.prev, node.next)
        };
        match prev {
            Some(prev_idx) => self.nodes[prev_idx].as_mut().unwrap().next = next,
            None => self.head = next,
        }
        match next {
            Some(next_idx) => self.nodes[next_idx].as_mut().unwrap().prev = prev,
            None => self.tail = prev,
        }
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = None;
            node.next = None;
        }
    }

    fn lru_push_back(&mut self, idx: usize) {
        let tail = self.tail;
        if let Some(node) = self.nodes[idx].as_mut() {
            node.prev = tail;
            node.next = None;
        }
        match tail {
            Some(tail_idx) => self.nodes[tail_idx].as_mut().unwrap().next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    /// Marks `idx` as most recently used by moving it to the tail.
    fn touch(&mut self, idx: usize) {
        if self.tail == Some(idx) {
            return;
        }
        self.lru_remove(idx);
        self.lru_push_back(idx);
    }

    fn insert_new(&mut self, key: String, value: Value<V>, deadline: Option<Instant>) -> usize {
        let idx = self.free.pop().unwrap_or_else(|| {
            self.nodes.push(None);
            self.nodes.len() - 1
        });
        self.nodes[idx] = Some(LruNode {
            key: key.clone(),
            value,
            deadline,
            prev: None,
            next: None,
        });
        self.lru_push_back(idx);
        self.map.insert(key, idx);
        idx
    }

    /// Detaches and removes `idx`, returning its node for callback/caller
    /// inspection. Updates the map and recycles the slot.
    fn remove_idx(&mut self, idx: usize) -> Option<LruNode<V>> {
        if self.nodes[idx].is_none() {
            return None;
        }
        self.lru_remove(idx);
        let node = self.nodes[idx].take();
        if let Some(node) = &node {
            self.map.remove(node.key.as_str());
        }
        self.free.push(idx);
        node
    }

    fn remove_key(&mut self, key: &str) -> Option<LruNode<V>> {
        let idx = *self.map.get(key)?;
        self.remove_idx(idx)
    }

    /// Removes and returns the least-recently used node, invoking the
    /// eviction callback if one is set.
    fn evict_one(&mut self) {
        let idx = match self.head {
            Some(idx) => idx,
            None => {
                tracing::warn!("lru list empty while eviction was requested; cache may exceed capacity_limit");
                return;
            }
        };
        if let Some(evicted) = self.remove_idx(idx) {
            if let Some(callback) = &self.eviction_callback {
                callback(&evicted.key, &evicted.value);
            }
        }
    }

    fn ensure_capacity_for_new_key(&mut self) {
        if self.capacity_limit != 0 && self.map.len() >= self.capacity_limit {
            self.evict_one();
        }
    }
}

/// The LRU alternative engine, implementing the same [`KvCache`] contract
/// as [`crate::PriorityCache`].
pub struct LruCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    inner: Arc<RwLock<LruInner<V>>>,
    sweeper: Mutex<Option<Sweeper>>,
    closed: AtomicBool,
}

impl<V> LruCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Builds a cache and starts its background sweeper immediately, same
    /// construction-time contract as `PriorityCache::new`.
    pub fn new(config: LruConfig<V>) -> Arc<Self> {
        let inner = Arc::new(RwLock::new(LruInner::new(config.capacity_limit, config.eviction_callback)));

        let sweeper_inner = Arc::clone(&inner);
        let sweeper = Sweeper::spawn(config.clean_interval, move || {
            sweep_expired(&sweeper_inner);
        });

        Arc::new(LruCache {
            inner,
            sweeper: Mutex::new(Some(sweeper)),
            closed: AtomicBool::new(false),
        })
    }

    fn deadline_for(ttl: Duration) -> Option<Instant> {
        if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        }
    }

    /// Returns the live node index for `key`, evicting it first if its
    /// deadline has already passed (lazy expiration).
    fn present_and_live(inner: &mut LruInner<V>, key: &str, now: Instant) -> Option<usize> {
        let idx = *inner.map.get(key)?;
        let expired = inner.nodes[idx].as_ref().map(|node| node.is_expired(now)).unwrap_or(false);
        if expired {
            if let Some(evicted) = inner.remove_idx(idx) {
                if let Some(callback) = &inner.eviction_callback {
                    callback(&evicted.key, &evicted.value);
                }
            }
            return None;
        }
        Some(idx)
    }
}

/// One sweep over every node, double-checking each expired candidate under
/// the write lock before evicting it — same snapshot/re-verify shape as
/// `sweeper::sweep_tick`, since an entry could be touched or deleted
/// between the read snapshot and the write pass.
fn sweep_expired<V>(inner: &RwLock<LruInner<V>>) {
    let now = Instant::now();
    let candidates: Vec<String> = {
        let guard = inner.read();
        guard
            .nodes
            .iter()
            .flatten()
            .filter(|node| node.is_expired(now))
            .map(|node| node.key.clone())
            .collect()
    };
    if candidates.is_empty() {
        return;
    }

    let mut evicted_count = 0usize;
    let mut guard = inner.write();
    for key in &candidates {
        let idx = match guard.map.get(key.as_str()) {
            Some(&idx) => idx,
            None => continue,
        };
        let still_expired = guard.nodes[idx].as_ref().map(|node| node.is_expired(now)).unwrap_or(false);
        if !still_expired {
            continue;
        }
        if let Some(evicted) = guard.remove_idx(idx) {
            evicted_count += 1;
            if let Some(callback) = &guard.eviction_callback {
                callback(&evicted.key, &evicted.value);
            }
        }
    }

    if evicted_count > 0 {
        tracing::trace!(evicted = evicted_count, scanned = candidates.len(), "lru sweeper tick evicted expired entries");
    }
}

impl<V> KvCache<V> for LruCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn set(&self, key: &str, value: V, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = LruCache::present_and_live(&mut inner, key, now);

        if let Some(idx) = live {
            match &inner.nodes[idx].as_ref().unwrap().value {
                Value::Scalar { nx: false, .. } => {}
                Value::Scalar { nx: true, .. } => {
                    return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyKvCanSet));
                }
                _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyScalarCanSet)),
            }
            inner.remove_idx(idx);
        }

        inner.ensure_capacity_for_new_key();
        let deadline = LruCache::<V>::deadline_for(ttl);
        inner.insert_new(key.to_string(), Value::Scalar { value, nx: false }, deadline);
        Ok(())
    }

    fn set_nx(&self, key: &str, value: V, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = LruCache::present_and_live(&mut inner, key, now);

        if let Some(idx) = live {
            let node = inner.nodes[idx].as_ref().unwrap();
            match &node.value {
                Value::Scalar { value: existing_value, nx: true } => {
                    if *existing_value == value {
                        let deadline = LruCache::<V>::deadline_for(ttl);
                        inner.nodes[idx].as_mut().unwrap().deadline = deadline;
                        inner.touch(idx);
                    }
                    return Ok(false);
                }
                _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyKvNxCanSetNx)),
            }
        }

        inner.ensure_capacity_for_new_key();
        let deadline = LruCache::<V>::deadline_for(ttl);
        inner.insert_new(key.to_string(), Value::Scalar { value, nx: true }, deadline);
        Ok(true)
    }

    fn get(&self, key: &str) -> CacheResult<V> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let idx = match LruCache::present_and_live(&mut inner, key, now) {
            Some(idx) => idx,
            None => return Err(CacheError::KeyNotFound),
        };

        let value = match &inner.nodes[idx].as_ref().unwrap().value {
            Value::Scalar { value, .. } => value.clone(),
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyScalarCanGet)),
        };

        inner.touch(idx);
        Ok(value)
    }

    fn get_set(&self, key: &str, value: V) -> CacheResult<Option<V>> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = LruCache::present_and_live(&mut inner, key, now);

        let old = match live {
            Some(idx) => match &inner.nodes[idx].as_ref().unwrap().value {
                Value::Scalar { value, .. } => Some(value.clone()),
                _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyScalarCanGetSet)),
            },
            None => None,
        };

        if let Some(idx) = live {
            inner.remove_idx(idx);
        }
        inner.ensure_capacity_for_new_key();
        inner.insert_new(key.to_string(), Value::Scalar { value, nx: false }, None);
        Ok(old)
    }

    fn delete(&self, ctx: &CacheContext, keys: &[&str]) -> CacheResult<DeleteOutcome> {
        if ctx.is_cancelled() {
            return Err(CacheError::ContextCancelled);
        }

        let mut deleted = 0usize;
        let mut cancelled = false;
        let mut inner = self.inner.write();
        for key in keys {
            if ctx.is_cancelled() {
                cancelled = true;
                break;
            }
            if inner.remove_key(key).is_some() {
                deleted += 1;
            }
        }

        Ok(DeleteOutcome { deleted, cancelled })
    }

    fn lpush(&self, key: &str, values: Vec<V>) -> CacheResult<usize> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let idx = match LruCache::present_and_live(&mut inner, key, now) {
            Some(idx) => idx,
            None => {
                inner.ensure_capacity_for_new_key();
                inner.insert_new(key.to_string(), Value::List(Default::default()), None)
            }
        };

        let node = inner.nodes[idx].as_mut().unwrap();
        let list = match &mut node.value {
            Value::List(list) => list,
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyListCanLpush)),
        };
        for v in values {
            list.push_front(v);
        }
        let len = list.len();
        inner.touch(idx);
        Ok(len)
    }

    fn lpop(&self, key: &str) -> CacheResult<V> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let idx = match LruCache::present_and_live(&mut inner, key, now) {
            Some(idx) => idx,
            None => return Err(CacheError::KeyNotFound),
        };

        let node = inner.nodes[idx].as_mut().unwrap();
        let popped = match &mut node.value {
            Value::List(list) => list.pop_front(),
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyListCanLpop)),
        };
        let is_empty = matches!(&node.value, Value::List(list) if list.is_empty());

        match popped {
            Some(value) => {
                if is_empty {
                    inner.remove_idx(idx);
                } else {
                    inner.touch(idx);
                }
                Ok(value)
            }
            None => {
                inner.remove_idx(idx);
                Err(CacheError::KeyNotFound)
            }
        }
    }

    fn sadd(&self, key: &str, members: Vec<V>) -> CacheResult<usize> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let idx = match LruCache::present_and_live(&mut inner, key, now) {
            Some(idx) => idx,
            None => {
                inner.ensure_capacity_for_new_key();
                inner.insert_new(key.to_string(), Value::Set(Default::default()), None)
            }
        };

        let node = inner.nodes[idx].as_mut().unwrap();
        let set = match &mut node.value {
            Value::Set(set) => set,
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlySetCanSadd)),
        };

        let mut added = 0usize;
        for m in members {
            if set.insert(m) {
                added += 1;
            }
        }
        inner.touch(idx);
        Ok(added)
    }

    fn srem(&self, key: &str, members: &[V]) -> CacheResult<usize> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let idx = match LruCache::present_and_live(&mut inner, key, now) {
            Some(idx) => idx,
            None => return Err(CacheError::KeyNotFound),
        };

        let node = inner.nodes[idx].as_mut().unwrap();
        let set = match &mut node.value {
            Value::Set(set) => set,
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlySetCanSrem)),
        };

        let mut removed = 0usize;
        for m in members {
            if set.remove(m) {
                removed += 1;
            }
        }
        let is_empty = matches!(&node.value, Value::Set(set) if set.is_empty());
        if is_empty {
            inner.remove_idx(idx);
        } else {
            inner.touch(idx);
        }
        Ok(removed)
    }

    fn incr_by(&self, key: &str, delta: i64) -> CacheResult<CounterValue> {
        self.apply_counter_delta(key, delta, TypeMismatchKind::OnlyNumericCanIncr)
    }

    fn decr_by(&self, key: &str, delta: i64) -> CacheResult<CounterValue> {
        self.apply_counter_delta(key, -delta, TypeMismatchKind::OnlyNumericCanDecr)
    }

    fn incr_by_float(&self, key: &str, delta: f64) -> CacheResult<f64> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let idx = match LruCache::present_and_live(&mut inner, key, now) {
            Some(idx) => idx,
            None => {
                inner.ensure_capacity_for_new_key();
                inner.insert_new(key.to_string(), Value::CounterF64(delta), None);
                return Ok(delta);
            }
        };

        let node = inner.nodes[idx].as_mut().unwrap();
        let new_value = match &mut node.value {
            Value::CounterF64(current) => {
                *current += delta;
                *current
            }
            Value::CounterI64(current) => {
                let promoted = *current as f64 + delta;
                node.value = Value::CounterF64(promoted);
                promoted
            }
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyNumericCanIncr)),
        };
        inner.touch(idx);
        Ok(new_value)
    }

    fn len(&self) -> usize {
        self.inner.read().map.len()
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return; // already closed
        }
        if let Some(mut sweeper) = self.sweeper.lock().take() {
            sweeper.stop();
        }
    }
}

impl<V> LruCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn apply_counter_delta(&self, key: &str, signed_delta: i64, mismatch_kind: TypeMismatchKind) -> CacheResult<CounterValue> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let idx = match LruCache::present_and_live(&mut inner, key, now) {
            Some(idx) => idx,
            None => {
                inner.ensure_capacity_for_new_key();
                inner.insert_new(key.to_string(), Value::CounterI64(signed_delta), None);
                return Ok(CounterValue::I64(signed_delta));
            }
        };

        let node = inner.nodes[idx].as_mut().unwrap();
        let result = match &mut node.value {
            Value::CounterI64(current) => {
                *current += signed_delta;
                Ok(CounterValue::I64(*current))
            }
            Value::CounterF64(current) => {
                *current += signed_delta as f64;
                Ok(CounterValue::F64(*current))
            }
            _ => Err(CacheError::TypeMismatch(mismatch_kind)),
        };
        if result.is_ok() {
            inner.touch(idx);
        }
        result
    }
}

impl<V> Drop for LruCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fresh_cache(capacity: usize) -> Arc<LruCache<String>> {
        LruCache::new(LruConfig {
            capacity_limit: capacity,
            ..Default::default()
        })
    }

    #[test]
    fn set_then_get_roundtrip() {
        let cache = fresh_cache(0);
        cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
        assert_eq!(cache.get("k").unwrap(), "v");
    }

    #[test]
    fn capacity_limit_evicts_least_recently_used() {
        let cache = fresh_cache(2);
        cache.set("a", "1".to_string(), Duration::ZERO).unwrap();
        cache.set("b", "2".to_string(), Duration::ZERO).unwrap();
        // Touch "a" so "b" becomes the least recently used entry.
        cache.get("a").unwrap();
        cache.set("c", "3".to_string(), Duration::ZERO).unwrap();

        assert!(matches!(cache.get("b").unwrap_err(), CacheError::KeyNotFound));
        assert!(cache.get("a").is_ok());
        assert!(cache.get("c").is_ok());
    }

    #[test]
    fn eviction_callback_observes_evicted_entries() {
        let evicted = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&evicted);
        let cache: Arc<LruCache<String>> = LruCache::new(LruConfig {
            capacity_limit: 1,
            eviction_callback: Some(Arc::new(move |key, _value| {
                recorder.lock().push(key.to_string());
            })),
            ..Default::default()
        });

        cache.set("a", "1".to_string(), Duration::ZERO).unwrap();
        cache.set("b", "2".to_string(), Duration::ZERO).unwrap();

        assert_eq!(evicted.lock().as_slice(), ["a".to_string()]);
    }

    #[test]
    fn ttl_exactly_elapsed_is_expired() {
        let cache = fresh_cache(0);
        cache.set("k", "v".to_string(), Duration::from_millis(1)).unwrap();
        thread::sleep(Duration::from_millis(5));
        assert!(matches!(cache.get("k").unwrap_err(), CacheError::KeyNotFound));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn background_sweeper_evicts_expired_entry_without_lazy_access() {
        let cache: Arc<LruCache<String>> = LruCache::new(LruConfig {
            clean_interval: Duration::from_millis(1),
            ..Default::default()
        });
        cache.set("k", "v".to_string(), Duration::from_millis(1)).unwrap();
        thread::sleep(Duration::from_millis(20));
        // No `get`/`set` on "k" here: if this passes, only `sweep_expired`
        // (not the lazy-expiration path in `present_and_live`) removed it.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn set_nx_true_then_false() {
        let cache = fresh_cache(0);
        assert!(cache.set_nx("k", "v1".to_string(), Duration::ZERO).unwrap());
        assert!(!cache.set_nx("k", "v2".to_string(), Duration::ZERO).unwrap());
        assert_eq!(cache.get("k").unwrap(), "v1");
    }

    #[test]
    fn set_on_set_nx_created_key_is_type_mismatch() {
        let cache = fresh_cache(0);
        cache.set_nx("k", "v1".to_string(), Duration::ZERO).unwrap();
        let err = cache.set("k", "v2".to_string(), Duration::ZERO).unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch(TypeMismatchKind::OnlyKvCanSet)));
        assert_eq!(cache.get("k").unwrap(), "v1");
    }

    #[test]
    fn lpush_then_lpop_order() {
        let cache = fresh_cache(0);
        cache.lpush("L", vec!["4".to_string()]).unwrap();
        cache.lpush("L", vec!["1".to_string()]).unwrap();
        assert_eq!(cache.lpop("L").unwrap(), "1");
        assert_eq!(cache.lpop("L").unwrap(), "4");
        assert!(matches!(cache.lpop("L").unwrap_err(), CacheError::KeyNotFound));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn sadd_srem_roundtrip() {
        let cache = fresh_cache(0);
        assert_eq!(cache.sadd("s", vec!["m".to_string()]).unwrap(), 1);
        assert_eq!(cache.srem("s", &["m".to_string()]).unwrap(), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn incr_and_decr_sum_correctly() {
        let cache = fresh_cache(0);
        assert_eq!(cache.incr_by("c", 3).unwrap(), CounterValue::I64(3));
        assert_eq!(cache.decr_by("c", 1).unwrap(), CounterValue::I64(2));
    }

    #[test]
    fn delete_batch_counts_present_keys() {
        let cache = fresh_cache(0);
        cache.set("a", "1".to_string(), Duration::ZERO).unwrap();
        cache.set("b", "2".to_string(), Duration::ZERO).unwrap();
        let ctx = CacheContext::new();
        let outcome = cache.delete(&ctx, &["a", "b", "missing"]).unwrap();
        assert_eq!(outcome.deleted, 2);
        assert!(!outcome.cancelled);
    }
}
