//! Registry client layer
//!
//! Abstraction over a distributed, watchable, lease-based key-value store used
//! for membership, worker id claims, distributed locks and change notification.
//! Backends are resolved by type identifier through [`RegistryFactory`].

pub mod backends;
pub mod config;
pub mod error;
pub mod factory;
pub mod lock;
pub mod traits;
pub mod types;

pub use backends::{MemoryRegistry, MemoryRepository};
pub use config::{RepositoryConfig, MEMORY_REPOSITORY_TYPE};
pub use error::{RegistryError, RegistryResult};
pub use factory::{RegistryFactory, RepositoryBuilder};
pub use lock::{LockManager, RegistryLock, RegistryLockGuard};
pub use traits::ClusterRepository;
pub use types::{
    join_path, ChangeKind, ConnectionStatus, DataChangedEvent, HealthStatus, RegistryWatch,
};
