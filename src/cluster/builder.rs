//! Node bootstrap against the cluster repository
//!
//! Bootstrap runs four phases in order and never retries:
//!
//! 1. attach the configured repository,
//! 2. allocate a worker id and build the instance context,
//! 3. register online, publish and load cluster state, peers, replica states
//!    and rules, then start watching the registry,
//! 4. hand the finished [`ContextManager`] to the caller.
//!
//! A failure after the repository attached rolls back whatever was
//! registered and closes the repository, so an aborted start leaves no
//! trace in the cluster.

use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::InstanceContext;
use super::context_manager::{deregister, BackgroundTasks, ContextManager};
use super::error::{ClusterError, ClusterResult};
use super::event::EventBusContext;
use super::instance::{InstanceMetaData, InstanceState};
use super::lock::{GlobalLockContext, METADATA_LOCK};
use super::registry_center::RegistryCenter;
use super::state::ClusterState;
use super::subscriber::ClusterSubscriber;
use super::watcher::RegistryWatcher;
use super::worker_id::ClusterWorkerIdGenerator;
use crate::config::NodeConfig;
use crate::executor::ExecutorEngine;
use crate::metadata::persist::metadata_root;
use crate::metadata::{MetaDataContexts, MetaDataPersistService, RegistryMetaDataPersistService};
use crate::registry::{ClusterRepository, RegistryFactory};
use crate::rule::RuleMetaData;

pub struct ClusterContextManagerBuilder {
    config: NodeConfig,
}

impl ClusterContextManagerBuilder {
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    pub async fn build(self) -> ClusterResult<ContextManager> {
        let repository = self.attach_repository().await?;
        let registry_center = Arc::new(RegistryCenter::new(repository.clone()));
        let metadata = self.config.instance.metadata();

        let worker_id_generator = ClusterWorkerIdGenerator::new(
            registry_center.clone(),
            &metadata.id,
            self.config.worker_id.max_worker_id,
            self.config.worker_id.allocation_timeout,
        );
        let worker_id = match worker_id_generator.generate().await {
            Ok(worker_id) => worker_id,
            Err(e) => {
                error!("Worker id allocation for {} failed: {}", metadata.id, e);
                rollback(&registry_center, &metadata, None).await;
                return Err(e);
            }
        };
        let instance = Arc::new(self.build_instance_context(metadata.clone(), worker_id, &repository));
        info!(
            "Built instance context {} ({}) with worker id {}",
            metadata.id,
            metadata.attributes(),
            worker_id
        );

        let persist: Arc<dyn MetaDataPersistService> =
            Arc::new(RegistryMetaDataPersistService::new(repository.clone()));
        let contexts = Arc::new(MetaDataContexts::new());
        let background = match self
            .register(&registry_center, &instance, &persist, &contexts)
            .await
        {
            Ok(background) => background,
            Err(e) => {
                error!("Registration of {} failed: {}", metadata.id, e);
                instance.lock_context().release_all().await;
                rollback(
                    &registry_center,
                    &metadata,
                    Some((&worker_id_generator, worker_id)),
                )
                .await;
                return Err(e);
            }
        };

        info!(
            "Instance {} is ready: {} peers, cluster state {}",
            metadata.id,
            instance.peers().await.len(),
            instance.cluster_state().await
        );
        Ok(ContextManager::new(
            registry_center,
            instance,
            worker_id_generator,
            contexts,
            persist,
            ExecutorEngine::new(self.config.executor.max_concurrency),
            background,
        ))
    }

    async fn attach_repository(&self) -> ClusterResult<Arc<dyn ClusterRepository>> {
        let repository_config = self
            .config
            .mode
            .repository
            .as_ref()
            .ok_or(ClusterError::MissingRepository)?;

        info!(
            "Attaching to {} repository in namespace {}",
            repository_config.repository_type, repository_config.namespace
        );
        RegistryFactory::from_config(repository_config)
            .await
            .map_err(|e| {
                error!("Repository attach failed: {}", e);
                ClusterError::from(e)
            })
    }

    fn build_instance_context(
        &self,
        metadata: InstanceMetaData,
        worker_id: u32,
        repository: &Arc<dyn ClusterRepository>,
    ) -> InstanceContext {
        let lock_context = GlobalLockContext::new(
            repository.clone(),
            self.config.lock.retry_delay,
            self.config.lock.default_timeout,
        );
        InstanceContext::new(
            metadata,
            worker_id,
            self.config.instance.labels.clone(),
            Arc::new(lock_context),
            EventBusContext::new(),
        )
    }

    async fn register(
        &self,
        registry_center: &Arc<RegistryCenter>,
        instance: &Arc<InstanceContext>,
        persist: &Arc<dyn MetaDataPersistService>,
        contexts: &Arc<MetaDataContexts>,
    ) -> ClusterResult<BackgroundTasks> {
        let nodes = registry_center.compute_nodes();
        let id = instance.id();

        nodes.register_online(instance.instance()).await?;
        nodes.persist_labels(id, &instance.labels().await).await?;
        nodes.persist_state(id, InstanceState::Ok).await?;
        registry_center
            .cluster_status()
            .persist_if_absent(ClusterState::Ok)
            .await?;

        // Watch before loading so nothing published meanwhile is missed
        let watches = RegistryWatcher::open(registry_center.repository()).await?;

        instance
            .set_cluster_state(registry_center.cluster_status().load().await?)
            .await;
        instance
            .set_peers(nodes.load_all_compute_node_instances(id).await?)
            .await;
        // Replica states first, so rules are built with them applied
        for (qualified, state) in registry_center.qualified_data_sources().load_status().await? {
            contexts
                .set_data_source_enabled(
                    &qualified.database,
                    &qualified.group_name,
                    &qualified.data_source,
                    state.is_enabled(),
                )
                .await;
        }
        self.load_databases(registry_center, instance, persist, contexts)
            .await?;

        let stop = CancellationToken::new();
        let subscriber = ClusterSubscriber::new(
            registry_center.clone(),
            instance.clone(),
            contexts.clone(),
        )
        .spawn(instance.event_bus().subscribe(), stop.child_token());
        let watcher = RegistryWatcher::start(
            watches,
            instance.event_bus().clone(),
            stop.child_token(),
        );

        Ok(BackgroundTasks {
            watcher,
            subscriber,
            stop,
        })
    }

    /// Publish local rules the registry does not know yet and load the rest
    async fn load_databases(
        &self,
        registry_center: &RegistryCenter,
        instance: &InstanceContext,
        persist: &Arc<dyn MetaDataPersistService>,
        contexts: &MetaDataContexts,
    ) -> ClusterResult<()> {
        let locks = instance.lock_context();
        let timeout = locks.default_timeout();
        if !locks.acquire(METADATA_LOCK, timeout).await? {
            return Err(ClusterError::LockTimeout {
                name: METADATA_LOCK.to_string(),
                timeout,
            });
        }

        let loaded = self
            .load_databases_locked(registry_center, persist, contexts)
            .await;
        let released = locks.release(METADATA_LOCK).await;
        loaded?;
        released
    }

    async fn load_databases_locked(
        &self,
        registry_center: &RegistryCenter,
        persist: &Arc<dyn MetaDataPersistService>,
        contexts: &MetaDataContexts,
    ) -> ClusterResult<()> {
        let mut names: BTreeSet<String> = registry_center
            .repository()
            .get_children_keys(metadata_root())
            .await?
            .into_iter()
            .collect();
        names.extend(self.config.databases.iter().map(|db| db.name.clone()));

        for name in names {
            let rules = match persist.load_rules(&name).await? {
                Some(rules) => {
                    debug!("Loaded {} rules of {} from the registry", rules.len(), name);
                    rules
                }
                None => {
                    let local = self
                        .config
                        .databases
                        .iter()
                        .find(|db| db.name == name)
                        .map(|db| db.rules.clone())
                        .unwrap_or_default();
                    persist.persist_rules(&name, &local).await?;
                    info!("Published {} local rules of {}", local.len(), name);
                    local
                }
            };

            let database = contexts
                .put_database(&name, RuleMetaData::from_configurations(&rules)?)
                .await;
            for table in persist.load_tables(&name).await? {
                database.put_table(table).await;
            }
        }
        Ok(())
    }
}

/// Undo a partial bootstrap; failures are logged, the original error wins
async fn rollback(
    registry_center: &RegistryCenter,
    metadata: &InstanceMetaData,
    worker_id: Option<(&ClusterWorkerIdGenerator, u32)>,
) {
    warn!("Rolling back registration of {}", metadata.id);
    if let Err(e) = deregister(registry_center, metadata, worker_id).await {
        warn!("Rollback of {} incomplete: {}", metadata.id, e);
    }
    if let Err(e) = registry_center.repository().close().await {
        warn!("Failed to close repository during rollback: {}", e);
    }
}
