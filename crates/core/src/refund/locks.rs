//! Per-purchase-line refund locks.
//!
//! A refund holds the locks of every purchase line it references across its
//! check-then-insert. Keys are acquired in sorted order so two refunds that
//! share lines cannot deadlock. Entries are removed once nobody holds or
//! waits on them, so the map only grows with in-flight refunds.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::ledger::RefundRef;

/// Registry of keyed async mutexes, one per purchase line under refund.
#[derive(Debug, Default)]
pub struct RefundLocks {
    locks: DashMap<RefundRef, Arc<Mutex<()>>>,
}

impl RefundLocks {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the locks for all given purchase lines.
    ///
    /// Duplicates are ignored. The returned guard releases everything on drop.
    pub async fn acquire(&self, keys: impl IntoIterator<Item = RefundRef>) -> RefundLockGuard<'_> {
        let mut keys: Vec<RefundRef> = keys.into_iter().collect();
        keys.sort_unstable();
        keys.dedup();

        let mut guards = Vec::with_capacity(keys.len());
        for key in &keys {
            // Clone the Arc out so no map shard stays locked across the await.
            let mutex = Arc::clone(self.locks.entry(*key).or_default().value());
            guards.push(mutex.lock_owned().await);
        }

        debug!(lines = keys.len(), "refund locks acquired");
        RefundLockGuard {
            registry: self,
            keys,
            guards,
        }
    }

    /// Number of purchase lines currently locked or awaited.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no refund is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Held refund locks.
#[derive(Debug)]
pub struct RefundLockGuard<'a> {
    registry: &'a RefundLocks,
    keys: Vec<RefundRef>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl RefundLockGuard<'_> {
    /// Purchase lines covered by this guard, sorted.
    #[must_use]
    pub fn keys(&self) -> &[RefundRef] {
        &self.keys
    }
}

impl Drop for RefundLockGuard<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            // Only the registry's own handle left means no holder and no waiter.
            self.registry
                .locks
                .remove_if(key, |_, mutex| Arc::strong_count(mutex) == 1);
        }
        debug!(lines = self.keys.len(), "refund locks released");
    }
}
