//! Core trait definitions for the registry client layer

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::error::RegistryResult;
use super::lock::RegistryLockGuard;
use super::types::{HealthStatus, RegistryWatch};

/// Client of a distributed, watchable, lease-based key-value store.
///
/// One client holds one lease session. Ephemeral keys and locks written
/// through it live exactly as long as that session.
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    /// Type identifier the backend was resolved by
    fn backend_type(&self) -> &str;

    /// Read a single key
    async fn get(&self, key: &str) -> RegistryResult<Option<String>>;

    /// Names of the direct children of a key, sorted
    async fn get_children_keys(&self, key: &str) -> RegistryResult<Vec<String>>;

    /// Write a persistent key
    async fn persist(&self, key: &str, value: &str) -> RegistryResult<()>;

    /// Write a key bound to this client's lease
    async fn persist_ephemeral(&self, key: &str, value: &str) -> RegistryResult<()>;

    /// Create a lease-bound key only if it does not exist yet.
    ///
    /// Returns `false` when the key is already present.
    async fn persist_exclusive_ephemeral(&self, key: &str, value: &str) -> RegistryResult<bool>;

    /// Delete a key and everything below it
    async fn delete(&self, key: &str) -> RegistryResult<()>;

    /// Subscribe to changes of keys starting with `prefix`
    async fn watch(&self, prefix: &str) -> RegistryResult<RegistryWatch>;

    /// Take a distributed lock without waiting, `Conflict` if it is held
    async fn try_lock(&self, key: &str) -> RegistryResult<Box<dyn RegistryLockGuard>>;

    /// Check the health of the backend
    async fn health_check(&self) -> RegistryResult<HealthStatus>;

    /// Release the lease; ephemeral keys and locks of this client disappear
    async fn close(&self) -> RegistryResult<()>;
}

impl dyn ClusterRepository {
    /// Read and decode a JSON value
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> RegistryResult<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encode and write a persistent JSON value
    pub async fn persist_json<T: Serialize + Sync>(&self, key: &str, value: &T) -> RegistryResult<()> {
        let raw = serde_json::to_string(value)?;
        self.persist(key, &raw).await
    }

    /// Encode and write a lease-bound JSON value
    pub async fn persist_ephemeral_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> RegistryResult<()> {
        let raw = serde_json::to_string(value)?;
        self.persist_ephemeral(key, &raw).await
    }
}
