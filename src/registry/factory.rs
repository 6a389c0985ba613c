//! Registry factory resolving repository backends by type identifier

use dashmap::DashMap;
use futures::future::BoxFuture;
use once_cell::sync::Lazy;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

use super::backends::MemoryRegistry;
use super::config::{RepositoryConfig, MEMORY_REPOSITORY_TYPE};
use super::error::{RegistryError, RegistryResult};
use super::traits::ClusterRepository;

/// Builds a connected repository from its configuration
pub type RepositoryBuilder = Arc<
    dyn Fn(RepositoryConfig) -> BoxFuture<'static, RegistryResult<Arc<dyn ClusterRepository>>>
        + Send
        + Sync,
>;

static BUILDERS: Lazy<DashMap<String, RepositoryBuilder>> = Lazy::new(|| {
    let builders: DashMap<String, RepositoryBuilder> = DashMap::new();
    builders.insert(
        MEMORY_REPOSITORY_TYPE.to_string(),
        Arc::new(|config: RepositoryConfig| {
            Box::pin(async move {
                let server = MemoryRegistry::shared(&config.namespace);
                let repository = server.connect(config.lease_ttl).await?;
                Ok::<_, RegistryError>(Arc::new(repository) as Arc<dyn ClusterRepository>)
            }) as BoxFuture<'static, _>
        }),
    );
    builders
});

/// Factory for creating repository instances
pub struct RegistryFactory;

impl RegistryFactory {
    /// Register a backend under a type identifier, replacing any previous one
    pub fn register<F, Fut>(repository_type: impl Into<String>, builder: F)
    where
        F: Fn(RepositoryConfig) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = RegistryResult<Arc<dyn ClusterRepository>>> + Send + 'static,
    {
        let repository_type = repository_type.into();
        debug!("Registering repository backend '{}'", repository_type);
        BUILDERS.insert(
            repository_type,
            Arc::new(move |config| Box::pin(builder(config)) as BoxFuture<'static, _>),
        );
    }

    /// Whether a backend is known for the type identifier
    pub fn is_registered(repository_type: &str) -> bool {
        BUILDERS.contains_key(repository_type)
    }

    /// Create a connected, healthy repository from explicit configuration
    pub async fn from_config(config: &RepositoryConfig) -> RegistryResult<Arc<dyn ClusterRepository>> {
        config.validate()?;

        let builder = BUILDERS
            .get(&config.repository_type)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                RegistryError::configuration(format!(
                    "unknown repository type '{}'",
                    config.repository_type
                ))
            })?;

        let repository = tokio::time::timeout(config.timeout, builder(config.clone()))
            .await
            .map_err(|_| RegistryError::Timeout(config.timeout))??;

        let health = repository.health_check().await?;
        if !health.healthy {
            repository.close().await?;
            return Err(RegistryError::unavailable(health.errors.join("; ")));
        }

        info!(
            "Attached {} repository (namespace '{}')",
            repository.backend_type(),
            config.namespace
        );
        Ok(repository)
    }
}
