//! The node's view of itself and of its peers

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::event::EventBusContext;
use super::instance::{ComputeNodeInstance, InstanceMetaData, InstanceState};
use super::lock::GlobalLockContext;
use super::state::ClusterState;

/// Identity and cluster view of the running node.
///
/// Everything outside the cluster module reads this context; the bootstrap
/// and the cluster subscriber are the only writers, hence the crate-private
/// mutators.
pub struct InstanceContext {
    instance: InstanceMetaData,
    worker_id: u32,
    labels: RwLock<Vec<String>>,
    state: RwLock<InstanceState>,
    cluster_state: RwLock<ClusterState>,
    peers: RwLock<BTreeMap<String, ComputeNodeInstance>>,
    lock_context: Arc<GlobalLockContext>,
    event_bus: EventBusContext,
}

impl InstanceContext {
    pub fn new(
        instance: InstanceMetaData,
        worker_id: u32,
        labels: Vec<String>,
        lock_context: Arc<GlobalLockContext>,
        event_bus: EventBusContext,
    ) -> Self {
        Self {
            instance,
            worker_id,
            labels: RwLock::new(labels),
            state: RwLock::new(InstanceState::Ok),
            cluster_state: RwLock::new(ClusterState::Ok),
            peers: RwLock::new(BTreeMap::new()),
            lock_context,
            event_bus,
        }
    }

    pub fn instance(&self) -> &InstanceMetaData {
        &self.instance
    }

    pub fn id(&self) -> &str {
        &self.instance.id
    }

    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    pub fn lock_context(&self) -> &Arc<GlobalLockContext> {
        &self.lock_context
    }

    pub fn event_bus(&self) -> &EventBusContext {
        &self.event_bus
    }

    pub async fn labels(&self) -> Vec<String> {
        self.labels.read().await.clone()
    }

    pub async fn state(&self) -> InstanceState {
        *self.state.read().await
    }

    pub async fn cluster_state(&self) -> ClusterState {
        *self.cluster_state.read().await
    }

    /// This node as a compute node instance
    pub async fn compute_node_instance(&self) -> ComputeNodeInstance {
        ComputeNodeInstance {
            metadata: self.instance.clone(),
            labels: self.labels().await,
            state: self.state().await,
            worker_id: Some(self.worker_id),
        }
    }

    /// Known peers ordered by instance id
    pub async fn peers(&self) -> Vec<ComputeNodeInstance> {
        self.peers.read().await.values().cloned().collect()
    }

    pub async fn peer(&self, instance_id: &str) -> Option<ComputeNodeInstance> {
        self.peers.read().await.get(instance_id).cloned()
    }

    pub(crate) async fn set_labels(&self, labels: Vec<String>) {
        *self.labels.write().await = labels;
    }

    pub(crate) async fn set_state(&self, state: InstanceState) {
        *self.state.write().await = state;
    }

    pub(crate) async fn set_cluster_state(&self, state: ClusterState) {
        *self.cluster_state.write().await = state;
    }

    pub(crate) async fn set_peers(&self, instances: Vec<ComputeNodeInstance>) {
        let mut peers = self.peers.write().await;
        peers.clear();
        for instance in instances {
            if instance.id() != self.id() {
                peers.insert(instance.id().to_string(), instance);
            }
        }
    }

    /// Add a peer or refresh its metadata, keeping known labels and state
    pub(crate) async fn upsert_peer(&self, metadata: InstanceMetaData) {
        if metadata.id == self.instance.id {
            return;
        }
        let mut peers = self.peers.write().await;
        match peers.get_mut(&metadata.id) {
            Some(existing) => existing.metadata = metadata,
            None => {
                peers.insert(metadata.id.clone(), ComputeNodeInstance::new(metadata));
            }
        }
    }

    /// Add or replace a peer with everything known about it
    pub(crate) async fn put_peer(&self, instance: ComputeNodeInstance) {
        if instance.id() == self.id() {
            return;
        }
        self.peers
            .write()
            .await
            .insert(instance.id().to_string(), instance);
    }

    pub(crate) async fn remove_peer(&self, instance_id: &str) -> Option<ComputeNodeInstance> {
        self.peers.write().await.remove(instance_id)
    }

    /// Apply `update` to a known peer; unknown peers are ignored
    pub(crate) async fn update_peer<F>(&self, instance_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut ComputeNodeInstance),
    {
        match self.peers.write().await.get_mut(instance_id) {
            Some(peer) => {
                update(peer);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::instance::InstanceType;
    use crate::registry::{ClusterRepository, MemoryRegistry};
    use std::time::Duration;

    fn metadata(id: &str) -> InstanceMetaData {
        InstanceMetaData {
            id: id.to_string(),
            instance_type: InstanceType::Proxy,
            host: "127.0.0.1".to_string(),
            port: 3307,
            version: "test".to_string(),
        }
    }

    async fn context(namespace: &str) -> InstanceContext {
        let repository: Arc<dyn ClusterRepository> = Arc::new(
            MemoryRegistry::new(namespace)
                .connect(Duration::from_secs(30))
                .await
                .unwrap(),
        );
        let locks = GlobalLockContext::new(
            repository,
            Duration::from_millis(10),
            Duration::from_secs(1),
        );
        InstanceContext::new(
            metadata("self"),
            3,
            vec!["olap".to_string()],
            Arc::new(locks),
            EventBusContext::new(),
        )
    }

    #[tokio::test]
    async fn test_peer_set_never_contains_self() {
        let context = context("context-self").await;

        context.upsert_peer(metadata("self")).await;
        context.upsert_peer(metadata("b")).await;
        context.put_peer(ComputeNodeInstance::new(metadata("self"))).await;
        context
            .set_peers(vec![
                ComputeNodeInstance::new(metadata("self")),
                ComputeNodeInstance::new(metadata("a")),
            ])
            .await;

        let ids: Vec<_> = context.peers().await.iter().map(|p| p.id().to_string()).collect();
        assert_eq!(ids, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_labels() {
        let context = context("context-upsert").await;
        context.upsert_peer(metadata("a")).await;
        assert!(
            context
                .update_peer("a", |peer| peer.labels = vec!["blue".to_string()])
                .await
        );

        let mut moved = metadata("a");
        moved.port = 3308;
        context.upsert_peer(moved).await;

        let peer = context.peer("a").await.unwrap();
        assert_eq!(peer.metadata.port, 3308);
        assert_eq!(peer.labels, vec!["blue".to_string()]);
        assert!(!context.update_peer("missing", |_| {}).await);
    }

    #[tokio::test]
    async fn test_self_snapshot() {
        let context = context("context-snapshot").await;
        let me = context.compute_node_instance().await;
        assert_eq!(me.worker_id, Some(3));
        assert_eq!(me.labels, vec!["olap".to_string()]);
        assert_eq!(context.cluster_state().await, ClusterState::Ok);
    }
}
