//! Handle on a running cluster node

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::context::InstanceContext;
use super::data_source::{DataSourceState, QualifiedDataSource};
use super::error::{ClusterError, ClusterResult};
use super::instance::InstanceMetaData;
use super::lock::{CLUSTER_STATE_LOCK, METADATA_LOCK};
use super::registry_center::RegistryCenter;
use super::state::ClusterState;
use super::watcher::RegistryWatcher;
use super::worker_id::ClusterWorkerIdGenerator;
use crate::executor::{DriverExecutor, ExecutorEngine, ProcessRegistry};
use crate::metadata::{MetaDataContexts, MetaDataPersistService, MetaDataRefreshEngine, MetadataError};
use crate::rule::{RuleConfiguration, RuleMetaData};

/// Watcher and subscriber tasks of a running node
pub(super) struct BackgroundTasks {
    pub(super) watcher: RegistryWatcher,
    pub(super) subscriber: JoinHandle<()>,
    pub(super) stop: CancellationToken,
}

impl BackgroundTasks {
    async fn stop(self) {
        self.stop.cancel();
        self.watcher.stop().await;
        if let Err(e) = self.subscriber.await {
            warn!("Cluster subscriber ended abnormally: {}", e);
        }
    }
}

/// Everything a bootstrapped node runs on
pub struct ContextManager {
    registry_center: Arc<RegistryCenter>,
    instance: Arc<InstanceContext>,
    worker_id_generator: ClusterWorkerIdGenerator,
    metadata: Arc<MetaDataContexts>,
    persist: Arc<dyn MetaDataPersistService>,
    refresh: Arc<MetaDataRefreshEngine>,
    processes: ProcessRegistry,
    engine: ExecutorEngine,
    background: Mutex<Option<BackgroundTasks>>,
    closed: AtomicBool,
}

impl fmt::Debug for ContextManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextManager")
            .field("instance", self.instance.instance())
            .field("worker_id", &self.instance.worker_id())
            .field("running_processes", &self.processes.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl ContextManager {
    pub(super) fn new(
        registry_center: Arc<RegistryCenter>,
        instance: Arc<InstanceContext>,
        worker_id_generator: ClusterWorkerIdGenerator,
        metadata: Arc<MetaDataContexts>,
        persist: Arc<dyn MetaDataPersistService>,
        engine: ExecutorEngine,
        background: BackgroundTasks,
    ) -> Self {
        Self {
            refresh: Arc::new(MetaDataRefreshEngine::new(persist.clone())),
            registry_center,
            instance,
            worker_id_generator,
            metadata,
            persist,
            processes: ProcessRegistry::new(),
            engine,
            background: Mutex::new(Some(background)),
            closed: AtomicBool::new(false),
        }
    }

    pub fn instance_context(&self) -> &Arc<InstanceContext> {
        &self.instance
    }

    pub fn metadata(&self) -> &Arc<MetaDataContexts> {
        &self.metadata
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    pub fn registry_center(&self) -> &Arc<RegistryCenter> {
        &self.registry_center
    }

    /// Executor for statements of a session on `database`.
    ///
    /// Rules are read at execution time, so an executor never sees a stale
    /// rule set.
    pub async fn driver_executor(&self, database: &str) -> ClusterResult<DriverExecutor> {
        if self.metadata.database(database).await.is_none() {
            return Err(MetadataError::DatabaseNotFound(database.to_string()).into());
        }
        Ok(DriverExecutor::new(
            self.metadata.clone(),
            self.processes.clone(),
            self.engine.clone(),
            self.refresh.clone(),
        ))
    }

    /// Replace the rules of `database` on every node
    pub async fn alter_rule_configuration(
        &self,
        database: &str,
        rules: Vec<RuleConfiguration>,
    ) -> ClusterResult<()> {
        let rule_metadata = RuleMetaData::from_configurations(&rules)?;

        self.acquire_global_lock(METADATA_LOCK).await?;
        let result = async {
            self.persist.persist_rules(database, &rules).await?;
            self.metadata.put_database(database, rule_metadata).await;
            Ok::<_, ClusterError>(())
        }
        .await;
        let released = self.instance.lock_context().release(METADATA_LOCK).await;

        result?;
        released?;
        info!("Altered {} rules of database {}", rules.len(), database);
        Ok(())
    }

    /// Persist a new cluster state; peers follow through their subscriber
    pub async fn set_cluster_state(&self, state: ClusterState) -> ClusterResult<()> {
        self.acquire_global_lock(CLUSTER_STATE_LOCK).await?;
        let result = self.registry_center.cluster_status().persist(state).await;
        if result.is_ok() {
            self.instance.set_cluster_state(state).await;
        }
        let released = self.instance.lock_context().release(CLUSTER_STATE_LOCK).await;

        result?;
        released?;
        info!("Cluster state set to {}", state);
        Ok(())
    }

    /// Enable or disable a read-write splitting replica on every node
    pub async fn set_data_source_state(
        &self,
        qualified: &QualifiedDataSource,
        state: DataSourceState,
    ) -> ClusterResult<()> {
        if self.metadata.database(&qualified.database).await.is_none() {
            return Err(MetadataError::DatabaseNotFound(qualified.database.clone()).into());
        }

        self.registry_center
            .qualified_data_sources()
            .persist_status(qualified, state)
            .await?;
        let known = self
            .metadata
            .set_data_source_enabled(
                &qualified.database,
                &qualified.group_name,
                &qualified.data_source,
                state.is_enabled(),
            )
            .await;
        if !known {
            warn!("No read-write splitting rule knows data source {}", qualified);
        }
        info!("Data source {} set to {}", qualified, state);
        Ok(())
    }

    /// Replace this node's labels
    pub async fn update_labels(&self, labels: Vec<String>) -> ClusterResult<()> {
        self.registry_center
            .compute_nodes()
            .persist_labels(self.instance.id(), &labels)
            .await?;
        self.instance.set_labels(labels).await;
        Ok(())
    }

    async fn acquire_global_lock(&self, name: &str) -> ClusterResult<()> {
        let locks = self.instance.lock_context();
        let timeout = locks.default_timeout();
        if locks.acquire(name, timeout).await? {
            Ok(())
        } else {
            Err(ClusterError::LockTimeout {
                name: name.to_string(),
                timeout,
            })
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Leave the cluster: cancel running statements, stop background tasks,
    /// release locks and the worker id, go offline and close the repository.
    /// Later calls do nothing.
    pub async fn shutdown(&self) -> ClusterResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!("Shutting down instance {}", self.instance.id());
        self.processes.cancel_all();

        if let Some(background) = self.background.lock().await.take() {
            background.stop().await;
        }
        self.instance.lock_context().release_all().await;

        let deregistered = deregister(
            &self.registry_center,
            self.instance.instance(),
            Some((&self.worker_id_generator, self.instance.worker_id())),
        )
        .await;
        let closed = self.registry_center.repository().close().await;

        deregistered?;
        closed?;
        info!("Instance {} is offline", self.instance.id());
        Ok(())
    }
}

/// Remove the worker id claim, the side records and the online record of an instance
pub(super) async fn deregister(
    registry_center: &RegistryCenter,
    instance: &InstanceMetaData,
    worker_id: Option<(&ClusterWorkerIdGenerator, u32)>,
) -> ClusterResult<()> {
    if let Some((generator, worker_id)) = worker_id {
        generator.release(worker_id).await?;
    }
    let nodes = registry_center.compute_nodes();
    nodes.remove_records(&instance.id).await?;
    nodes.offline(instance).await?;
    Ok(())
}
