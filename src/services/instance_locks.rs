//! Per-instance mutual exclusion
//!
//! Operations on the same instance id run one at a time; different ids never
//! contend. Entries are dropped from the table once nobody holds or waits on
//! them.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
pub struct InstanceLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InstanceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `instance_id`
    pub async fn acquire(&self, instance_id: &str) -> InstanceGuard {
        let lock = self
            .locks
            .entry(instance_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;
        InstanceGuard {
            locks: Arc::clone(&self.locks),
            instance_id: instance_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of ids currently held or awaited
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Exclusive access to one instance id, released on drop
#[derive(Debug)]
pub struct InstanceGuard {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    instance_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl InstanceGuard {
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the table still references the mutex: no holder, no waiter
        self.locks.remove_if(&self.instance_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
