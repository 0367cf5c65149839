//! # cachekit-core
//!
//! An in-process, thread-safe key-value cache engine with Redis-like
//! operations (scalar get/set, atomic counters, list head operations, set
//! membership) and pluggable eviction: a priority-driven engine built on an
//! ordered index and a min-heap (`PriorityCache`), or a self-contained LRU
//! alternative (`LruCache`). Both implement the shared [`KvCache`] contract
//! so a host process can swap one for the other without touching call
//! sites.
//!
//! No network protocol, CLI, or on-disk format is part of this crate's
//! surface — it is meant to be embedded directly in a process that needs
//! low-latency lookups with bounded memory, without a network hop.

mod cache;
mod config;
mod heap;
mod index;
mod kv_cache;
mod lru;
mod node;
mod priority;
mod sweeper;

pub use cache::PriorityCache;
pub use config::{CacheConfig, LruConfig};
pub use kv_cache::{DeleteOutcome, KvCache};
pub use lru::LruCache;
pub use node::{CounterValue, Value, ValueKind};
pub use priority::{PriorityExtractor, PriorityMode};

pub use cachekit_common::{CacheContext, CacheError, CacheResult, TypeMismatchKind};
