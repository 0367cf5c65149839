use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A small cancellation/deadline token, threaded through `delete`'s batch
/// loop, the only operation that honors mid-call cancellation.
///
/// Cloning shares the same cancellation flag; cancelling any clone cancels
/// all of them.
#[derive(Clone)]
pub struct CacheContext {
    deadline: Option<Instant>,
    cancelled: Arc<AtomicBool>,
}

impl Default for CacheContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheContext {
    /// A context with no deadline that is never cancelled unless `cancel()`
    /// is called on it (or a clone of it).
    pub fn new() -> Self {
        CacheContext {
            deadline: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A context that is considered cancelled once `deadline` has passed.
    pub fn with_deadline(deadline: Instant) -> Self {
        CacheContext {
            deadline: Some(deadline),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks this context (and every clone of it) as cancelled.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// True once `cancel()` has been called, or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::Acquire) {
            return true;
        }
        match self.deadline {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn fresh_context_is_not_cancelled() {
        assert!(!CacheContext::new().is_cancelled());
    }

    #[test]
    fn explicit_cancel_is_observed_by_clones() {
        let ctx = CacheContext::new();
        let clone = ctx.clone();
        ctx.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn past_deadline_is_cancelled() {
        let ctx = CacheContext::with_deadline(Instant::now() - Duration::from_secs(1));
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn future_deadline_is_not_cancelled() {
        let ctx = CacheContext::with_deadline(Instant::now() + Duration::from_secs(60));
        assert!(!ctx.is_cancelled());
    }
}
