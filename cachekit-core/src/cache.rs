//! Priority-driven cache façade.
//!
//! Every operation acquires the single write lock for its whole duration;
//! there is no separate read-locked fast path to keep consistent with the
//! LRU/LFU touch side effects.

use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};

use cachekit_common::{CacheContext, CacheError, CacheResult, TypeMismatchKind};

use crate::config::CacheConfig;
use crate::heap::{HeapEntry, PriorityHeap};
use crate::index::OrderedIndex;
use crate::kv_cache::{DeleteOutcome, KvCache};
use crate::node::{CacheNode, CounterValue, Value};
use crate::priority::{initial_priority, touched_priority, PriorityMode};
use crate::sweeper::{sweep_tick, Sweeper};

/// Lock-guarded state shared between the façade and the sweeper thread.
pub struct CacheInner<V> {
    pub(crate) index: OrderedIndex<V>,
    heap: PriorityHeap,
    seq_counter: u64,
    priority_mode: PriorityMode<V>,
    default_priority: i64,
    capacity_limit: usize,
    default_expiration: Duration,
}

impl<V> CacheInner<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn push_entry(&mut self, key: &str, priority: i64) -> u64 {
        self.seq_counter += 1;
        let seq = self.seq_counter;
        self.heap.push(HeapEntry {
            priority,
            seq,
            key: key.to_string(),
        });
        seq
    }

    /// Pops the heap until a live, current entry is found, then deletes
    /// its node from the index.
    fn evict_one(&mut self) {
        loop {
            let entry = match self.heap.pop() {
                Some(entry) => entry,
                None => {
                    tracing::warn!("priority heap empty while eviction was requested; cache may exceed capacity_limit");
                    return;
                }
            };
            if entry.key.is_empty() {
                continue;
            }
            let current = match self.index.find(&entry.key) {
                Some(node) => node.heap_seq == entry.seq && !node.tombstone,
                None => false,
            };
            if current {
                self.index.delete(&entry.key);
                return;
            }
            // Stale or tombstoned entry; keep popping.
        }
    }

    fn ensure_capacity_for_new_key(&mut self) {
        if self.capacity_limit != 0 && self.index.len() >= self.capacity_limit {
            self.evict_one();
        }
    }

    fn insert_fresh(&mut self, key: &str, value: Value<V>, deadline: Option<Instant>) {
        self.ensure_capacity_for_new_key();
        let priority = initial_priority(&self.priority_mode, &value, self.default_priority);
        let mut node = CacheNode::new(key.to_string(), value, deadline, priority, 0);
        let seq = self.push_entry(key, priority);
        node.heap_seq = seq;
        self.index.insert(node);
    }

    /// Touches a node's priority on access (LRU/LFU modes), pushing a
    /// fresh heap entry so the old one becomes stale.
    fn touch(&mut self, key: &str) {
        let (value_clone, hit_count) = match self.index.find(key) {
            Some(node) => (node.value_clone_for_touch(), node.priority),
            None => return,
        };
        let next_hit_count = hit_count + 1;
        let new_priority = touched_priority(&self.priority_mode, &value_clone, self.default_priority, next_hit_count);
        let seq = self.push_entry(key, new_priority);
        if let Some(node) = self.index.find_mut(key) {
            node.priority = new_priority;
            node.heap_seq = seq;
        }
    }

    /// Removes `key` from the index if its current value is present and
    /// empty (a list or set that's been emptied by `lpop`/`srem`).
    fn delete_if_empty_container(&mut self, key: &str) {
        let should_delete = match self.index.find(key) {
            Some(node) => match &node.value {
                Value::List(list) => list.is_empty(),
                Value::Set(set) => set.is_empty(),
                _ => false,
            },
            None => false,
        };
        if should_delete {
            self.index.delete(key);
        }
    }
}

// `touch` needs a cheap way to re-derive priority from the current value
// without fighting the borrow checker over `&mut self.index` /
// `&self.priority_mode` at the same time; cloning the tag-relevant bits is
// simplest here since `V: Clone` is already a trait-level bound.
impl<V: Clone> CacheNode<V> {
    fn value_clone_for_touch(&self) -> Value<V> {
        self.value.clone()
    }
}

/// The priority-driven cache engine: ordered index, min-heap eviction
/// order, TTL tracking, and a background sweeper, wired together behind
/// the [`KvCache`] façade.
pub struct PriorityCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    inner: Arc<RwLock<CacheInner<V>>>,
    default_expiration: Duration,
    sweeper: Mutex<Option<Sweeper>>,
    closed: AtomicBool,
}

impl<V> PriorityCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Builds a cache and starts its background sweeper immediately.
    pub fn new(config: CacheConfig<V>) -> Arc<Self> {
        let default_expiration = config.default_expiration;
        let clean_interval = config.clean_interval;
        let scan_count = config.scan_count;

        let inner = Arc::new(RwLock::new(CacheInner {
            index: OrderedIndex::new(),
            heap: PriorityHeap::new(),
            seq_counter: 0,
            priority_mode: config.priority_mode,
            default_priority: config.default_priority,
            capacity_limit: config.capacity_limit,
            default_expiration,
        }));

        let sweeper_inner = Arc::clone(&inner);
        let sweeper = Sweeper::spawn(clean_interval, move || {
            sweep_tick(&sweeper_inner, scan_count);
        });

        Arc::new(PriorityCache {
            inner,
            default_expiration,
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

    /// True iff the node is present and not expired; expired nodes are
    /// deleted as a side effect (lazy expiration).
    fn present_and_live(inner: &mut CacheInner<V>, key: &str, now: Instant) -> bool {
        match inner.index.find(key) {
            Some(node) if node.is_expired(now) => {
                inner.index.delete(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

impl<V> KvCache<V> for PriorityCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn set(&self, key: &str, value: V, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = PriorityCache::present_and_live(&mut inner, key, now);

        if live {
            match &inner.index.find(key).unwrap().value {
                Value::Scalar { nx: false, .. } => {}
                Value::Scalar { nx: true, .. } => {
                    return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyKvCanSet));
                }
                _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyScalarCanSet)),
            }
        }

        let deadline = PriorityCache::<V>::deadline_for(ttl);
        inner.index.delete(key);
        inner.insert_fresh(key, Value::Scalar { value, nx: false }, deadline);
        Ok(())
    }

    fn set_nx(&self, key: &str, value: V, ttl: Duration) -> CacheResult<bool> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = PriorityCache::present_and_live(&mut inner, key, now);

        if live {
            let existing = inner.index.find(key).unwrap();
            match &existing.value {
                Value::Scalar { value: existing_value, nx: true } => {
                    if *existing_value == value {
                        let deadline = PriorityCache::<V>::deadline_for(ttl);
                        inner.index.find_mut(key).unwrap().deadline = deadline;
                    }
                    return Ok(false);
                }
                _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyKvNxCanSetNx)),
            }
        }

        let deadline = PriorityCache::<V>::deadline_for(ttl);
        inner.insert_fresh(key, Value::Scalar { value, nx: true }, deadline);
        Ok(true)
    }

    fn get(&self, key: &str) -> CacheResult<V> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        if !PriorityCache::present_and_live(&mut inner, key, now) {
            return Err(CacheError::KeyNotFound);
        }

        let value = match &inner.index.find(key).unwrap().value {
            Value::Scalar { value, .. } => value.clone(),
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyScalarCanGet)),
        };

        inner.touch(key);
        Ok(value)
    }

    fn get_set(&self, key: &str, value: V) -> CacheResult<Option<V>> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = PriorityCache::present_and_live(&mut inner, key, now);

        let old = if live {
            match &inner.index.find(key).unwrap().value {
                Value::Scalar { value, .. } => Some(value.clone()),
                _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyScalarCanGetSet)),
            }
        } else {
            None
        };

        inner.index.delete(key);
        let default_expiration = inner.default_expiration;
        inner.insert_fresh(key, Value::Scalar { value, nx: false }, Some(now + default_expiration));
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
            if inner.index.delete(key).is_some() {
                deleted += 1;
            }
        }

        Ok(DeleteOutcome { deleted, cancelled })
    }

    fn lpush(&self, key: &str, values: Vec<V>) -> CacheResult<usize> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = PriorityCache::present_and_live(&mut inner, key, now);

        if !live {
            inner.insert_fresh(key, Value::List(Default::default()), None);
        }

        let node = inner.index.find_mut(key).unwrap();
        let list = match &mut node.value {
            Value::List(list) => list,
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyListCanLpush)),
        };
        for v in values {
            list.push_front(v);
        }
        Ok(list.len())
    }

    fn lpop(&self, key: &str) -> CacheResult<V> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        if !PriorityCache::present_and_live(&mut inner, key, now) {
            return Err(CacheError::KeyNotFound);
        }

        let node = inner.index.find_mut(key).unwrap();
        let popped = match &mut node.value {
            Value::List(list) => list.pop_front(),
            _ => return Err(CacheError::TypeMismatch(TypeMismatchKind::OnlyListCanLpop)),
        };

        match popped {
            Some(value) => {
                inner.delete_if_empty_container(key);
                Ok(value)
            }
            None => {
                inner.delete_if_empty_container(key);
                Err(CacheError::KeyNotFound)
            }
        }
    }

    fn sadd(&self, key: &str, members: Vec<V>) -> CacheResult<usize> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = PriorityCache::present_and_live(&mut inner, key, now);

        if !live {
            inner.insert_fresh(key, Value::Set(Default::default()), None);
        }

        let node = inner.index.find_mut(key).unwrap();
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
        Ok(added)
    }

    fn srem(&self, key: &str, members: &[V]) -> CacheResult<usize> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        if !PriorityCache::present_and_live(&mut inner, key, now) {
            return Err(CacheError::KeyNotFound);
        }

        let node = inner.index.find_mut(key).unwrap();
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
        inner.delete_if_empty_container(key);
        Ok(removed)
    }

    fn incr_by(&self, key: &str, delta: i64) -> CacheResult<CounterValue> {
        apply_counter_delta(&self.inner, key, delta, TypeMismatchKind::OnlyNumericCanIncr)
    }

    fn decr_by(&self, key: &str, delta: i64) -> CacheResult<CounterValue> {
        apply_counter_delta(&self.inner, key, -delta, TypeMismatchKind::OnlyNumericCanDecr)
    }

    fn incr_by_float(&self, key: &str, delta: f64) -> CacheResult<f64> {
        let now = Instant::now();
        let mut inner = self.inner.write();
        let live = PriorityCache::present_and_live(&mut inner, key, now);

        if !live {
            inner.insert_fresh(key, Value::CounterF64(delta), None);
            return Ok(delta);
        }

        let node = inner.index.find_mut(key).unwrap();
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
        Ok(new_value)
    }

    fn len(&self) -> usize {
        self.inner.read().index.len()
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

impl<V> Drop for PriorityCache<V>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.close();
    }
}

fn apply_counter_delta<V>(
    inner: &RwLock<CacheInner<V>>,
    key: &str,
    signed_delta: i64,
    mismatch_kind: TypeMismatchKind,
) -> CacheResult<CounterValue>
where
    V: Clone + Eq + Hash + Send + Sync + 'static,
{
    let now = Instant::now();
    let mut inner = inner.write();
    let live = PriorityCache::present_and_live(&mut inner, key, now);

    if !live {
        inner.insert_fresh(key, Value::CounterI64(signed_delta), None);
        return Ok(CounterValue::I64(signed_delta));
    }

    let node = inner.index.find_mut(key).unwrap();
    match &mut node.value {
        Value::CounterI64(current) => {
            *current += signed_delta;
            Ok(CounterValue::I64(*current))
        }
        Value::CounterF64(current) => {
            *current += signed_delta as f64;
            Ok(CounterValue::F64(*current))
        }
        _ => Err(CacheError::TypeMismatch(mismatch_kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn fresh_cache(capacity: usize) -> Arc<PriorityCache<String>> {
        PriorityCache::new(CacheConfig {
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
    fn set_on_non_scalar_is_type_mismatch() {
        let cache = fresh_cache(0);
        cache.lpush("k", vec!["a".to_string()]).unwrap();
        let err = cache.set("k", "v".to_string(), Duration::ZERO).unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch(TypeMismatchKind::OnlyScalarCanSet)));
    }

    #[test]
    fn set_nx_true_then_false() {
        let cache = fresh_cache(0);
        assert!(cache.set_nx("k", "v1".to_string(), Duration::ZERO).unwrap());
        assert!(!cache.set_nx("k", "v2".to_string(), Duration::ZERO).unwrap());
        assert_eq!(cache.get("k").unwrap(), "v1");
    }

    #[test]
    fn set_nx_on_plain_set_key_is_type_mismatch() {
        let cache = fresh_cache(0);
        cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
        let err = cache.set_nx("k", "v".to_string(), Duration::ZERO).unwrap_err();
        assert!(matches!(err, CacheError::TypeMismatch(TypeMismatchKind::OnlyKvNxCanSetNx)));
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
    fn set_nx_matching_value_refreshes_ttl_but_returns_false() {
        let cache = fresh_cache(0);
        assert!(cache.set_nx("k", "v".to_string(), Duration::from_millis(20)).unwrap());
        thread::sleep(Duration::from_millis(5));
        assert!(!cache.set_nx("k", "v".to_string(), Duration::from_secs(60)).unwrap());
        thread::sleep(Duration::from_millis(20));
        // Still alive because the second set_nx refreshed the deadline.
        assert_eq!(cache.get("k").unwrap(), "v");
    }

    #[test]
    fn get_on_missing_key_is_not_found() {
        let cache = fresh_cache(0);
        assert!(matches!(cache.get("missing").unwrap_err(), CacheError::KeyNotFound));
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
        let cache: Arc<PriorityCache<String>> = PriorityCache::new(CacheConfig {
            clean_interval: Duration::from_millis(1),
            ..Default::default()
        });
        cache.set("k", "v".to_string(), Duration::from_millis(1)).unwrap();
        thread::sleep(Duration::from_millis(20));
        // No `get`/`set` on "k" here: if this passes, only the background
        // sweeper (not the lazy-expiration path) could have removed it.
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn get_set_reports_none_on_first_create() {
        let cache = fresh_cache(0);
        assert_eq!(cache.get_set("k", "v1".to_string()).unwrap(), None);
        assert_eq!(cache.get_set("k", "v2".to_string()).unwrap(), Some("v1".to_string()));
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
    fn sadd_is_idempotent_on_count() {
        let cache = fresh_cache(0);
        assert_eq!(cache.sadd("s", vec!["m".to_string()]).unwrap(), 1);
        assert_eq!(cache.sadd("s", vec!["m".to_string()]).unwrap(), 0);
    }

    #[test]
    fn srem_deletes_node_when_set_becomes_empty() {
        let cache = fresh_cache(0);
        cache.sadd("s", vec!["m".to_string()]).unwrap();
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
    fn incr_by_float_promotes_i64_to_f64() {
        let cache = fresh_cache(0);
        cache.incr_by("c", 3).unwrap();
        cache.decr_by("c", 1).unwrap();
        let promoted = cache.incr_by_float("c", 0.5).unwrap();
        assert!((promoted - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn capacity_limit_evicts_by_priority() {
        let cache: Arc<PriorityCache<i32>> = PriorityCache::new(CacheConfig {
            capacity_limit: 2,
            priority_mode: PriorityMode::Static(Some(Arc::new(
                |value: &Value<i32>| match value {
                    Value::Scalar { value, .. } => Some(*value as i64),
                    _ => None,
                },
            ))),
            ..Default::default()
        });

        cache.set("k1", 1, Duration::ZERO).unwrap();
        cache.set("k2", 2, Duration::ZERO).unwrap();
        cache.set("k3", 3, Duration::ZERO).unwrap();
        cache.set("k4", 4, Duration::ZERO).unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get("k3").is_ok());
        assert!(cache.get("k4").is_ok());
    }

    #[test]
    fn delete_cancelled_context_returns_immediately() {
        let cache = fresh_cache(0);
        cache.set("k", "v".to_string(), Duration::ZERO).unwrap();
        let ctx = CacheContext::new();
        ctx.cancel();
        let err = cache.delete(&ctx, &["k"]).unwrap_err();
        assert!(matches!(err, CacheError::ContextCancelled));
        assert_eq!(cache.len(), 1);
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
