use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-owner async locks
///
/// Every operation that touches an owner's entries holds that owner's lock
/// for its whole read-modify-write-rerank cycle. Owners never share a lock.
#[derive(Clone, Default)]
pub struct OwnerLocks {
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl OwnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `owner`
    pub async fn acquire(&self, owner: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = lock_ignoring_poison(&self.locks);
            // Nobody holds or waits on a lock whose only reference is the registry's
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(owner.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of owners currently tracked
    pub fn len(&self) -> usize {
        lock_ignoring_poison(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Owners whose stored ranks are known to be out of date
#[derive(Clone, Default)]
pub struct StaleOwners {
    owners: Arc<Mutex<HashSet<String>>>,
}

impl StaleOwners {
    pub fn mark(&self, owner: &str) {
        lock_ignoring_poison(&self.owners).insert(owner.to_string());
    }

    pub fn clear(&self, owner: &str) {
        lock_ignoring_poison(&self.owners).remove(owner);
    }

    pub fn contains(&self, owner: &str) -> bool {
        lock_ignoring_poison(&self.owners).contains(owner)
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_owner_is_serialized() {
        let locks = OwnerLocks::new();
        let guard = locks.acquire("alice").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _guard = contender.acquire("alice").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("second acquire should complete once released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_owners_are_independent() {
        let locks = OwnerLocks::new();
        let _alice = locks.acquire("alice").await;

        let bob = tokio::time::timeout(Duration::from_millis(100), locks.acquire("bob")).await;
        assert!(bob.is_ok());
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = OwnerLocks::new();
        drop(locks.acquire("alice").await);
        drop(locks.acquire("bob").await);

        let _carol = locks.acquire("carol").await;
        assert_eq!(locks.len(), 1);
    }

    #[test]
    fn test_stale_owners() {
        let stale = StaleOwners::default();
        assert!(!stale.contains("alice"));
        stale.mark("alice");
        assert!(stale.contains("alice"));
        stale.clear("alice");
        assert!(!stale.contains("alice"));
    }
}
