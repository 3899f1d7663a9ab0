//! Per-key mutation locks
//!
//! Every collection instance bound to the same key shares one async mutex,
//! so read-modify-write cycles on that key never interleave inside a process.
//! An entry lives only while some task holds or waits on it.

use std::sync::Arc;

use dashmap::DashMap;
use lazy_static::lazy_static;
use tokio::sync::{Mutex, OwnedMutexGuard};

lazy_static! {
    static ref KEY_LOCKS: DashMap<String, Arc<Mutex<()>>> = DashMap::new();
}

/// Exclusive access to one key; releasing it prunes the registry entry when
/// nobody else is queued
pub(crate) struct KeyGuard {
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the registry's own handle left
        KEY_LOCKS.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Wait for exclusive access to `key`
pub(crate) async fn acquire(key: &str) -> KeyGuard {
    let lock = KEY_LOCKS
        .entry(key.to_string())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    KeyGuard {
        key: key.to_string(),
        guard: Some(lock.lock_owned().await),
    }
}

#[cfg(test)]
fn is_registered(key: &str) -> bool {
    KEY_LOCKS.contains_key(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let guard = acquire("key-lock-test-exclusive").await;
        let waiter = tokio::spawn(async { acquire("key-lock-test-exclusive").await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        assert!(waiter.await.is_ok());
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let _a = acquire("key-lock-test-a").await;
        let b = tokio::time::timeout(Duration::from_millis(100), acquire("key-lock-test-b")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_entry_released_with_last_guard() {
        let guard = acquire("key-lock-test-prune").await;
        assert!(is_registered("key-lock-test-prune"));

        let waiter = tokio::spawn(async { acquire("key-lock-test-prune").await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The queued waiter keeps the entry alive
        drop(guard);
        let second = waiter.await.unwrap();
        assert!(is_registered("key-lock-test-prune"));

        drop(second);
        assert!(!is_registered("key-lock-test-prune"));
    }
}
