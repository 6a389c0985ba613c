//! Registry repository configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::error::{RegistryError, RegistryResult};

/// Type identifier of the built-in in-memory backend
pub const MEMORY_REPOSITORY_TYPE: &str = "memory";

/// Configuration of the cluster repository a node attaches to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Backend type identifier, resolved by the registry factory
    #[serde(rename = "type")]
    pub repository_type: String,

    /// Namespace isolating one cluster's keys from another's
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Backend server addresses, backend specific
    #[serde(default)]
    pub server_lists: String,

    /// Default timeout for registry round-trips
    #[serde(with = "humantime_serde", default = "default_timeout")]
    pub timeout: Duration,

    /// Lease time to live for ephemeral keys
    #[serde(with = "humantime_serde", default = "default_lease_ttl")]
    pub lease_ttl: Duration,

    /// Delay between lock acquisition attempts
    #[serde(with = "humantime_serde", default = "default_retry_delay")]
    pub retry_delay: Duration,

    /// Backend-specific properties
    #[serde(default)]
    pub props: HashMap<String, String>,
}

fn default_namespace() -> String {
    "shardcore".to_string()
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_lease_ttl() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(50)
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            repository_type: MEMORY_REPOSITORY_TYPE.to_string(),
            namespace: default_namespace(),
            server_lists: String::new(),
            timeout: default_timeout(),
            lease_ttl: default_lease_ttl(),
            retry_delay: default_retry_delay(),
            props: HashMap::new(),
        }
    }
}

impl RepositoryConfig {
    /// Create a memory repository configuration for the given namespace
    pub fn memory(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    /// Override the lease time to live
    pub fn with_lease_ttl(mut self, lease_ttl: Duration) -> Self {
        self.lease_ttl = lease_ttl;
        self
    }

    /// Reject configurations no backend could honour
    pub fn validate(&self) -> RegistryResult<()> {
        if self.repository_type.trim().is_empty() {
            return Err(RegistryError::configuration(
                "repository type must not be empty",
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(RegistryError::configuration(
                "repository namespace must not be empty",
            ));
        }
        if self.timeout.is_zero() {
            return Err(RegistryError::configuration(
                "repository timeout must be greater than zero",
            ));
        }
        if self.lease_ttl.is_zero() {
            return Err(RegistryError::configuration(
                "repository lease_ttl must be greater than zero",
            ));
        }
        Ok(())
    }
}
