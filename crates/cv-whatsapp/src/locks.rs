//! Per-contact serialization

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Keyed async mutex: one holder per phone number at a time
#[derive(Clone, Default)]
pub struct ContactLocks {
    locks: Arc<LockMap>,
}

/// Held while a contact's message is being handled
pub struct ContactGuard {
    guard: Option<OwnedMutexGuard<()>>,
    phone: String,
    locks: Arc<LockMap>,
}

impl ContactLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `phone`
    pub async fn lock(&self, phone: &str) -> ContactGuard {
        let mutex = Arc::clone(self.locks.entry(phone.to_string()).or_default().value());
        let guard = mutex.lock_owned().await;

        ContactGuard {
            guard: Some(guard),
            phone: phone.to_string(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of phones with a live lock entry
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for ContactGuard {
    fn drop(&mut self) {
        // Release first so only the map's reference remains when idle.
        self.guard.take();
        self.locks
            .remove_if(self.phone.as_str(), |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_idle_entries_are_evicted() {
        let locks = ContactLocks::new();
        {
            let _guard = locks.lock("573001234567").await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_same_phone_is_serialized() {
        let locks = ContactLocks::new();
        let guard = locks.lock("573001234567").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = other.lock("573001234567").await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_distinct_phones_do_not_block() {
        let locks = ContactLocks::new();
        let _first = locks.lock("573001234567").await;

        let second = tokio::time::timeout(Duration::from_secs(1), locks.lock("573009999999")).await;
        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
