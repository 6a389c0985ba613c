//! Named cluster-wide locks

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::ClusterResult;
use super::node_path;
use crate::registry::{ClusterRepository, LockManager, RegistryLockGuard};

pub const CLUSTER_STATE_LOCK: &str = "cluster_state";
pub const METADATA_LOCK: &str = "metadata";

/// Acquires named locks under `/lock/global/locks`.
///
/// Not reentrant: acquiring a name this node already holds waits until the
/// timeout and returns `false`.
pub struct GlobalLockContext {
    manager: LockManager,
    held: DashMap<String, Box<dyn RegistryLockGuard>>,
    default_timeout: Duration,
}

impl GlobalLockContext {
    pub fn new(
        repository: Arc<dyn ClusterRepository>,
        retry_delay: Duration,
        default_timeout: Duration,
    ) -> Self {
        Self {
            manager: LockManager::new(repository, retry_delay),
            held: DashMap::new(),
            default_timeout,
        }
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// `Ok(false)` when the lock stayed held elsewhere for `timeout`
    pub async fn acquire(&self, name: &str, timeout: Duration) -> ClusterResult<bool> {
        let key = node_path::global_lock_path(name);
        match self.manager.wait_for_lock(&key, timeout).await {
            Ok(guard) => {
                debug!("Acquired global lock {} as {}", name, guard.lock_info().holder);
                self.held.insert(name.to_string(), guard);
                Ok(true)
            }
            Err(e) if e.is_timeout() => {
                debug!("Global lock {} not acquired within {:?}", name, timeout);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Releasing a lock this node does not hold is a no-op
    pub async fn release(&self, name: &str) -> ClusterResult<()> {
        if let Some((_, guard)) = self.held.remove(name) {
            guard.release().await?;
            debug!("Released global lock {}", name);
        }
        Ok(())
    }

    pub fn is_held(&self, name: &str) -> bool {
        self.held.contains_key(name)
    }

    pub async fn release_all(&self) {
        let names: Vec<String> = self.held.iter().map(|entry| entry.key().clone()).collect();
        for name in names {
            if let Err(e) = self.release(&name).await {
                warn!("Failed to release global lock {}: {}", name, e);
            }
        }
    }
}
