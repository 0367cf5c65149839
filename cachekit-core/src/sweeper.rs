//! Background expiration sweeper.
//!
//! Started at cache construction; stopped by dropping the stop sender,
//! which unblocks the thread's `recv_timeout` with `Disconnected`.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

pub struct Sweeper {
    stop_tx: Option<mpsc::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub fn spawn<F>(clean_interval: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join = std::thread::spawn(move || loop {
            match stop_rx.recv_timeout(clean_interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => tick(),
            }
        });

        Sweeper {
            stop_tx: Some(stop_tx),
            join: Some(join),
        }
    }

    /// Stops the sweeper and waits for the thread to finish. Dropping
    /// `stop_tx` disconnects the channel, which is what actually wakes the
    /// thread; calling this more than once is a no-op (`stop_tx`/`join`
    /// are already `None`).
    pub fn stop(&mut self) {
        self.stop_tx.take();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One sweep tick over `scan_count` keys from a snapshot of `keys`,
/// double-checking each under the write lock before deleting: acquire the
/// write lock, re-verify the candidate is still expired, then delete.
pub fn sweep_tick<V>(
    inner: &RwLock<crate::cache::CacheInner<V>>,
    scan_count: usize,
) where
    V: Clone + std::hash::Hash + Eq + Send + Sync + 'static,
{
    let snapshot: Vec<String> = {
        let guard = inner.read();
        guard.index.keys().take(scan_count).map(String::from).collect()
    };

    let now = Instant::now();
    let mut evicted = 0usize;
    for key in &snapshot {
        let mut guard = inner.write();
        let expired = guard.index.find(key).is_some_and(|node| node.is_expired(now));
        if expired {
            guard.index.delete(key);
            evicted += 1;
        }
    }

    if evicted > 0 {
        tracing::trace!(evicted, scanned = snapshot.len(), "sweeper tick evicted expired entries");
    }
}

/// Arc-friendly convenience used by both the priority cache and tests.
pub type SharedInner<V> = Arc<RwLock<crate::cache::CacheInner<V>>>;
