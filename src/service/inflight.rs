//! Per-key serialization of toggles
//!
//! Two toggles on the same (target, actor, kind) run one after the other;
//! unrelated keys never wait on each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InFlightKey {
    pub target_id: String,
    pub actor_id: String,
    pub kind: &'static str,
}

impl InFlightKey {
    pub fn new(target_id: &str, actor_id: &str, kind: &'static str) -> Self {
        Self {
            target_id: target_id.to_string(),
            actor_id: actor_id.to_string(),
            kind,
        }
    }
}

/// Held for the whole toggle; dropping it lets the next caller in
pub type InFlightGuard = OwnedMutexGuard<()>;

#[derive(Debug, Default)]
pub struct InFlight {
    locks: Mutex<HashMap<InFlightKey, Arc<AsyncMutex<()>>>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other toggle holds `key`
    pub async fn acquire(&self, key: InFlightKey) -> InFlightGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Drop idle entries: only the map still references them.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Keys currently held or waited on
    pub fn len(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, block_on, task};

    #[test]
    fn same_key_waits_for_the_holder() {
        let inflight = InFlight::new();
        let key = InFlightKey::new("t1", "a1", "follow");

        let guard = block_on(inflight.acquire(key.clone()));

        let mut waiter = task::spawn(inflight.acquire(key));
        assert_pending!(waiter.poll());
        assert_pending!(waiter.poll());

        drop(guard);
        assert!(waiter.is_woken());
        let next = assert_ready!(waiter.poll());
        drop(next);
        drop(waiter);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let inflight = InFlight::new();
        let _follow = inflight
            .acquire(InFlightKey::new("t1", "a1", "follow"))
            .await;
        let _mute = tokio::time::timeout(
            Duration::from_secs(1),
            inflight.acquire(InFlightKey::new("t1", "a1", "mute")),
        )
        .await
        .unwrap();

        assert_eq!(inflight.len(), 2);
    }
}
