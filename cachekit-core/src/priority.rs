//! Priority derivation.
//!
//! Three modes: `static` (priority comes from an optional user-supplied
//! extractor, else a configured default), `lru` (last-access unix-second,
//! touched on every `get`), `lfu` (monotonically increasing hit count).
//! Touches happen under the façade's write lock.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::node::Value;

/// A dyn-dispatch trait object boundary: a value may optionally expose a
/// priority hint, and a blanket impl lets callers pass a plain closure
/// instead of a named type.
pub trait PriorityExtractor<V>: Send + Sync {
    fn extract(&self, value: &Value<V>) -> Option<i64>;
}

impl<V, F> PriorityExtractor<V> for F
where
    F: Fn(&Value<V>) -> Option<i64> + Send + Sync,
{
    fn extract(&self, value: &Value<V>) -> Option<i64> {
        self(value)
    }
}

/// How a node's priority is derived at insert/access time.
pub enum PriorityMode<V> {
    /// Priority from an optional extractor, else `default_priority`.
    Static(Option<Arc<dyn PriorityExtractor<V>>>),
    /// Priority is the last-access unix-second timestamp.
    Lru,
    /// Priority is a monotonically increasing hit count.
    Lfu,
}

impl<V> Clone for PriorityMode<V> {
    fn clone(&self) -> Self {
        match self {
            PriorityMode::Static(extractor) => PriorityMode::Static(extractor.clone()),
            PriorityMode::Lru => PriorityMode::Lru,
            PriorityMode::Lfu => PriorityMode::Lfu,
        }
    }
}

impl<V> Default for PriorityMode<V> {
    fn default() -> Self {
        PriorityMode::Static(None)
    }
}

/// Current unix-second timestamp, used by LRU-mode priority.
pub fn unix_now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Computes the priority to assign on first insert.
pub fn initial_priority<V>(mode: &PriorityMode<V>, value: &Value<V>, default_priority: i64) -> i64 {
    match mode {
        PriorityMode::Static(extractor) => extractor
            .as_ref()
            .and_then(|extractor| extractor.extract(value))
            .unwrap_or(default_priority),
        PriorityMode::Lru => unix_now_secs(),
        PriorityMode::Lfu => 1,
    }
}

/// Computes the refreshed priority on an access (`get`). `hit_count` is the
/// node's hit counter *before* this access, incremented by the caller.
pub fn touched_priority<V>(mode: &PriorityMode<V>, value: &Value<V>, default_priority: i64, hit_count: i64) -> i64 {
    match mode {
        PriorityMode::Static(extractor) => extractor
            .as_ref()
            .and_then(|extractor| extractor.extract(value))
            .unwrap_or(default_priority),
        PriorityMode::Lru => unix_now_secs(),
        PriorityMode::Lfu => hit_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_mode_falls_back_to_default_without_extractor() {
        let mode: PriorityMode<i32> = PriorityMode::Static(None);
        let value = Value::CounterI64(0);
        assert_eq!(initial_priority(&mode, &value, 42), 42);
    }

    #[test]
    fn static_mode_uses_extractor_when_present() {
        let extractor: Arc<dyn PriorityExtractor<i32>> =
            Arc::new(|_: &Value<i32>| Some(7));
        let mode = PriorityMode::Static(Some(extractor));
        let value = Value::CounterI64(0);
        assert_eq!(initial_priority(&mode, &value, 42), 7);
    }

    #[test]
    fn lfu_mode_uses_hit_count() {
        let mode: PriorityMode<i32> = PriorityMode::Lfu;
        let value = Value::CounterI64(0);
        assert_eq!(touched_priority(&mode, &value, 0, 9), 9);
    }
}
