//! Constructor options for both cache engines.

use std::sync::Arc;
use std::time::Duration;

use crate::node::Value;
use crate::priority::PriorityMode;

/// Constructor options for `PriorityCache`.
pub struct CacheConfig<V> {
    /// Maximum number of live nodes; `0` disables the bound.
    pub capacity_limit: usize,
    /// Interval between sweeper ticks.
    pub clean_interval: Duration,
    /// Max entries the sweeper visits per tick.
    pub scan_count: usize,
    /// TTL applied by `get_set` when it creates a fresh entry.
    pub default_expiration: Duration,
    /// How a node's priority is derived.
    pub priority_mode: PriorityMode<V>,
    /// Priority used when `priority_mode` is `Static` and the value
    /// exposes no hint.
    pub default_priority: i64,
}

impl<V> Default for CacheConfig<V> {
    fn default() -> Self {
        CacheConfig {
            capacity_limit: 0,
            clean_interval: Duration::from_secs(1),
            scan_count: 1000,
            default_expiration: Duration::from_secs(30),
            priority_mode: PriorityMode::default(),
            default_priority: 0,
        }
    }
}

/// Constructor options for `LruCache`.
pub struct LruConfig<V> {
    /// Maximum number of live nodes; `0` disables the bound.
    pub capacity_limit: usize,
    /// Interval between sweeper ticks.
    pub clean_interval: Duration,
    /// Invoked with `(key, value)` of every entry the engine evicts,
    /// whether by capacity pressure or expiration.
    pub eviction_callback: Option<Arc<dyn Fn(&str, &Value<V>) + Send + Sync>>,
}

impl<V> Default for LruConfig<V> {
    fn default() -> Self {
        LruConfig {
            capacity_limit: 0,
            clean_interval: Duration::from_secs(10),
            eviction_callback: None,
        }
    }
}
