use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// A mutex that allows locking based on a key (e.g., a file ID).
/// This prevents global locking when only per-file synchronization is needed.
#[derive(Debug, Clone)]
pub struct KeyedMutex {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedMutex {
    pub fn new() -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Acquires a lock for the given key.
    /// The lock is released when the returned guard is dropped.
    pub async fn lock(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        mutex.lock_owned().await
    }

    /// Removes locks that are not currently held by any task.
    pub fn cleanup(&self) {
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
    }
}

impl Default for KeyedMutex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let m = KeyedMutex::new();
        let _a = m.lock("a").await;
        let _b = m.lock("b").await;
    }

    #[tokio::test]
    async fn test_cleanup_retains_held_locks() {
        let m = KeyedMutex::new();
        let guard = m.lock("held").await;
        {
            let _released = m.lock("released").await;
        }
        m.cleanup();
        assert!(m.locks.contains_key("held"));
        assert!(!m.locks.contains_key("released"));
        drop(guard);
    }
}
