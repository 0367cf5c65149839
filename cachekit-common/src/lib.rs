//! # cachekit-common
//!
//! Shared error taxonomy and cancellation primitives used by every
//! `cachekit-*` crate, so the façade, the priority engine, and the LRU
//! alternative engine all fail the same way for the same reasons.

mod context;
mod error;

pub use context::CacheContext;
pub use error::{CacheError, CacheResult, TypeMismatchKind};
