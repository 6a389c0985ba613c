//! Typed access to the compute node and cluster state records

use std::sync::Arc;
use tracing::{debug, warn};

use super::data_source::QualifiedDataSourceStatusService;
use super::instance::{ComputeNodeInstance, InstanceMetaData, InstanceState, InstanceType};
use super::node_path;
use super::state::ClusterState;
use crate::registry::{ClusterRepository, RegistryResult};

/// Records describing individual compute nodes
pub struct ComputeNodeStatusService {
    repository: Arc<dyn ClusterRepository>,
}

impl ComputeNodeStatusService {
    pub fn new(repository: Arc<dyn ClusterRepository>) -> Self {
        Self { repository }
    }

    /// Write the lease-bound online record
    pub async fn register_online(&self, metadata: &InstanceMetaData) -> RegistryResult<()> {
        self.repository
            .persist_ephemeral_json(
                &node_path::online_path(metadata.instance_type, &metadata.id),
                metadata,
            )
            .await
    }

    pub async fn offline(&self, metadata: &InstanceMetaData) -> RegistryResult<()> {
        self.repository
            .delete(&node_path::online_path(metadata.instance_type, &metadata.id))
            .await
    }

    /// Labels and status live as long as the node's lease
    pub async fn persist_labels(&self, instance_id: &str, labels: &[String]) -> RegistryResult<()> {
        self.repository
            .persist_ephemeral_json(&node_path::labels_path(instance_id), &labels)
            .await
    }

    pub async fn load_labels(&self, instance_id: &str) -> RegistryResult<Vec<String>> {
        Ok(self
            .repository
            .get_json(&node_path::labels_path(instance_id))
            .await?
            .unwrap_or_default())
    }

    pub async fn persist_state(&self, instance_id: &str, state: InstanceState) -> RegistryResult<()> {
        self.repository
            .persist_ephemeral_json(&node_path::status_path(instance_id), &state)
            .await
    }

    pub async fn load_state(&self, instance_id: &str) -> RegistryResult<InstanceState> {
        Ok(self
            .repository
            .get_json(&node_path::status_path(instance_id))
            .await?
            .unwrap_or_default())
    }

    /// Drop the labels and status records of an instance
    pub async fn remove_records(&self, instance_id: &str) -> RegistryResult<()> {
        self.repository
            .delete(&node_path::status_path(instance_id))
            .await?;
        self.repository
            .delete(&node_path::labels_path(instance_id))
            .await
    }

    pub async fn persist_worker_id(&self, instance_id: &str, worker_id: u32) -> RegistryResult<()> {
        self.repository
            .persist_ephemeral_json(&node_path::worker_id_path(instance_id), &worker_id)
            .await
    }

    pub async fn load_worker_id(&self, instance_id: &str) -> RegistryResult<Option<u32>> {
        self.repository
            .get_json(&node_path::worker_id_path(instance_id))
            .await
    }

    pub async fn remove_worker_id(&self, instance_id: &str) -> RegistryResult<()> {
        self.repository
            .delete(&node_path::worker_id_path(instance_id))
            .await
    }

    /// Load one instance from its online record and side records
    pub async fn load_instance(
        &self,
        metadata: InstanceMetaData,
    ) -> RegistryResult<ComputeNodeInstance> {
        let id = metadata.id.clone();
        let mut instance = ComputeNodeInstance::new(metadata);
        instance.labels = self.load_labels(&id).await?;
        instance.state = self.load_state(&id).await?;
        instance.worker_id = self.load_worker_id(&id).await?;
        Ok(instance)
    }

    /// All online compute nodes except `exclude_id`
    pub async fn load_all_compute_node_instances(
        &self,
        exclude_id: &str,
    ) -> RegistryResult<Vec<ComputeNodeInstance>> {
        let mut instances = Vec::new();

        for instance_type in [InstanceType::Proxy, InstanceType::Jdbc] {
            let root = node_path::online_type_root(instance_type);
            for id in self.repository.get_children_keys(&root).await? {
                if id == exclude_id {
                    continue;
                }
                let key = node_path::online_path(instance_type, &id);
                match self.repository.get_json::<InstanceMetaData>(&key).await {
                    Ok(Some(metadata)) => instances.push(self.load_instance(metadata).await?),
                    // Went offline between listing and reading
                    Ok(None) => {}
                    Err(e) if e.is_retryable() => return Err(e),
                    Err(e) => warn!("Skipping unreadable online record {}: {}", key, e),
                }
            }
        }

        debug!("Loaded {} peer instances", instances.len());
        Ok(instances)
    }
}

/// The cluster-wide state record
pub struct ClusterStatusService {
    repository: Arc<dyn ClusterRepository>,
}

impl ClusterStatusService {
    pub fn new(repository: Arc<dyn ClusterRepository>) -> Self {
        Self { repository }
    }

    /// Write the state only if no node has written one yet
    pub async fn persist_if_absent(&self, state: ClusterState) -> RegistryResult<()> {
        if self.repository.get(node_path::cluster_state_path()).await?.is_none() {
            self.persist(state).await?;
        }
        Ok(())
    }

    pub async fn persist(&self, state: ClusterState) -> RegistryResult<()> {
        self.repository
            .persist_json(node_path::cluster_state_path(), &state)
            .await
    }

    pub async fn load(&self) -> RegistryResult<ClusterState> {
        Ok(self
            .repository
            .get_json(node_path::cluster_state_path())
            .await?
            .unwrap_or_default())
    }
}

/// Entry point to all registry-backed cluster records
pub struct RegistryCenter {
    repository: Arc<dyn ClusterRepository>,
    compute_nodes: ComputeNodeStatusService,
    cluster_status: ClusterStatusService,
    qualified_data_sources: QualifiedDataSourceStatusService,
}

impl RegistryCenter {
    pub fn new(repository: Arc<dyn ClusterRepository>) -> Self {
        Self {
            compute_nodes: ComputeNodeStatusService::new(repository.clone()),
            cluster_status: ClusterStatusService::new(repository.clone()),
            qualified_data_sources: QualifiedDataSourceStatusService::new(repository.clone()),
            repository,
        }
    }

    pub fn repository(&self) -> &Arc<dyn ClusterRepository> {
        &self.repository
    }

    pub fn compute_nodes(&self) -> &ComputeNodeStatusService {
        &self.compute_nodes
    }

    pub fn cluster_status(&self) -> &ClusterStatusService {
        &self.cluster_status
    }

    pub fn qualified_data_sources(&self) -> &QualifiedDataSourceStatusService {
        &self.qualified_data_sources
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use std::time::Duration;

    fn metadata(id: &str, instance_type: InstanceType) -> InstanceMetaData {
        InstanceMetaData {
            id: id.to_string(),
            instance_type,
            host: "127.0.0.1".to_string(),
            port: 3307,
            version: "test".to_string(),
        }
    }

    async fn center(namespace: &str) -> RegistryCenter {
        let server = MemoryRegistry::new(namespace);
        let repository: Arc<dyn ClusterRepository> =
            Arc::new(server.connect(Duration::from_secs(30)).await.unwrap());
        RegistryCenter::new(repository)
    }

    #[tokio::test]
    async fn test_load_peers_excludes_self_and_reads_side_records() {
        let center = center("center-peers").await;
        let nodes = center.compute_nodes();

        nodes.register_online(&metadata("self", InstanceType::Proxy)).await.unwrap();
        nodes.register_online(&metadata("p1", InstanceType::Proxy)).await.unwrap();
        nodes.register_online(&metadata("j1", InstanceType::Jdbc)).await.unwrap();
        nodes
            .persist_labels("p1", &["blue".to_string()])
            .await
            .unwrap();
        nodes.persist_worker_id("j1", 4).await.unwrap();

        let peers = nodes.load_all_compute_node_instances("self").await.unwrap();
        let ids: Vec<_> = peers.iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["p1".to_string(), "j1".to_string()]);
        assert_eq!(peers[0].labels, vec!["blue".to_string()]);
        assert_eq!(peers[1].worker_id, Some(4));
        assert_eq!(peers[1].state, InstanceState::Ok);
    }

    #[tokio::test]
    async fn test_node_records_vanish_with_the_lease() {
        let server = MemoryRegistry::new("center-lease");
        let repository: Arc<dyn ClusterRepository> =
            Arc::new(server.connect(Duration::from_secs(30)).await.unwrap());
        let nodes = ComputeNodeStatusService::new(repository.clone());
        nodes.persist_labels("n1", &["blue".to_string()]).await.unwrap();
        nodes.persist_state("n1", InstanceState::CircuitBreak).await.unwrap();
        nodes.persist_labels("n2", &["red".to_string()]).await.unwrap();

        nodes.remove_records("n2").await.unwrap();
        assert!(nodes.load_labels("n2").await.unwrap().is_empty());

        repository.close().await.unwrap();
        let reader = ComputeNodeStatusService::new(Arc::new(
            server.connect(Duration::from_secs(30)).await.unwrap(),
        ));
        assert!(reader.load_labels("n1").await.unwrap().is_empty());
        assert_eq!(reader.load_state("n1").await.unwrap(), InstanceState::Ok);
    }

    #[tokio::test]
    async fn test_cluster_state_persisted_once() {
        let center = center("center-state").await;
        let status = center.cluster_status();

        assert_eq!(status.load().await.unwrap(), ClusterState::Ok);
        status.persist_if_absent(ClusterState::ReadOnly).await.unwrap();
        status.persist_if_absent(ClusterState::Ok).await.unwrap();
        assert_eq!(status.load().await.unwrap(), ClusterState::ReadOnly);
    }
}
