//! Distributed locking primitives on top of the registry

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::error::{RegistryError, RegistryResult};
use super::traits::ClusterRepository;

/// Registry lock information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryLock {
    /// Unique lock key
    pub key: String,
    /// Lock holder identifier
    pub holder: String,
    /// When the lock was acquired
    pub acquired_at: DateTime<Utc>,
    /// Lock token for verification
    pub token: String,
}

impl RegistryLock {
    /// Create a new registry lock
    pub fn new(key: String, holder: String) -> Self {
        Self {
            key,
            holder,
            acquired_at: Utc::now(),
            token: Uuid::new_v4().to_string(),
        }
    }
}

/// Handle on a held registry lock
#[async_trait]
pub trait RegistryLockGuard: Send + Sync {
    /// Get the lock information
    fn lock_info(&self) -> &RegistryLock;

    /// Explicitly release the lock
    async fn release(self: Box<Self>) -> RegistryResult<()>;
}

/// Lock manager for waiting on contended registry locks
pub struct LockManager {
    repository: Arc<dyn ClusterRepository>,
    retry_delay: Duration,
}

impl LockManager {
    /// Create a new lock manager
    pub fn new(repository: Arc<dyn ClusterRepository>, retry_delay: Duration) -> Self {
        Self {
            repository,
            retry_delay,
        }
    }

    /// Wait for a lock to become available
    pub async fn wait_for_lock(
        &self,
        key: &str,
        timeout: Duration,
    ) -> RegistryResult<Box<dyn RegistryLockGuard>> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.repository.try_lock(key).await {
                Ok(guard) => return Ok(guard),
                Err(e) if e.is_conflict() => {
                    let now = tokio::time::Instant::now();
                    if now >= deadline {
                        return Err(RegistryError::Timeout(timeout));
                    }
                    debug!("Lock {} is held, retrying", key);
                    tokio::time::sleep(self.retry_delay.min(deadline - now)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
