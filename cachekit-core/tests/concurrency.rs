//! Integration test stressing concurrent writers against a
//! capacity-bounded cache: many threads race to insert distinct keys while
//! the eviction path keeps the live set at the configured limit.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use cachekit_core::{CacheConfig, KvCache, LruConfig, LruCache, PriorityCache};

#[test]
fn ten_thousand_concurrent_sets_respect_priority_cache_capacity() {
    let cache: Arc<PriorityCache<i32>> = PriorityCache::new(CacheConfig {
        capacity_limit: 100,
        ..Default::default()
    });

    let mut handles = Vec::new();
    for i in 0..10_000 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            cache.set(&format!("k{i}"), i, Duration::ZERO).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 100);
}

#[test]
fn ten_thousand_concurrent_sets_respect_lru_cache_capacity() {
    let cache: Arc<LruCache<i32>> = LruCache::new(LruConfig {
        capacity_limit: 100,
        ..Default::default()
    });

    let mut handles = Vec::new();
    for i in 0..10_000 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            cache.set(&format!("k{i}"), i, Duration::ZERO).unwrap();
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(cache.len(), 100);
}
