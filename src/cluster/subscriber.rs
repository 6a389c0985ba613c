//! Applies cluster events to the node's local state

use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::InstanceContext;
use super::event::ClusterEvent;
use super::instance::InstanceMetaData;
use super::registry_center::RegistryCenter;
use crate::metadata::MetaDataContexts;
use crate::rule::RuleMetaData;

/// Single writer of the peer set, labels and states of the instance context
/// and of rules, replica states and tables in the metadata contexts once a
/// node is running
pub struct ClusterSubscriber {
    registry_center: Arc<RegistryCenter>,
    instance: Arc<InstanceContext>,
    metadata: Arc<MetaDataContexts>,
}

impl ClusterSubscriber {
    pub fn new(
        registry_center: Arc<RegistryCenter>,
        instance: Arc<InstanceContext>,
        metadata: Arc<MetaDataContexts>,
    ) -> Self {
        Self {
            registry_center,
            instance,
            metadata,
        }
    }

    /// Consume events from `receiver` until `shutdown` fires or the bus closes
    pub fn spawn(
        self,
        mut receiver: broadcast::Receiver<ClusterEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    received = receiver.recv() => match received {
                        Ok(event) => self.apply(event).await,
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("Cluster subscriber lagged, skipped {} events", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Cluster subscriber stopped");
        })
    }

    /// Side record changes of a peer not yet known are dropped, so a new peer
    /// is read back in full
    async fn peer_online(&self, metadata: InstanceMetaData) {
        if self.instance.peer(&metadata.id).await.is_some() {
            self.instance.upsert_peer(metadata).await;
            return;
        }
        match self
            .registry_center
            .compute_nodes()
            .load_instance(metadata.clone())
            .await
        {
            Ok(peer) => self.instance.put_peer(peer).await,
            Err(e) => {
                warn!("Could not load records of instance {}: {}", metadata.id, e);
                self.instance.upsert_peer(metadata).await;
            }
        }
    }

    pub async fn apply(&self, event: ClusterEvent) {
        let self_id = self.instance.id().to_string();

        match event {
            ClusterEvent::InstanceOnline { instance } => {
                if instance.id != self_id {
                    info!("Instance {} is online at {}", instance.id, instance.attributes());
                    self.peer_online(instance).await;
                }
            }
            ClusterEvent::InstanceOffline { instance_id } => {
                if self.instance.remove_peer(&instance_id).await.is_some() {
                    info!("Instance {} went offline", instance_id);
                }
            }
            ClusterEvent::LabelsChanged {
                instance_id,
                labels,
            } => {
                if instance_id == self_id {
                    self.instance.set_labels(labels).await;
                } else {
                    self.instance
                        .update_peer(&instance_id, |peer| peer.labels = labels)
                        .await;
                }
            }
            ClusterEvent::InstanceStateChanged { instance_id, state } => {
                if instance_id == self_id {
                    self.instance.set_state(state).await;
                } else {
                    self.instance
                        .update_peer(&instance_id, |peer| peer.state = state)
                        .await;
                }
            }
            ClusterEvent::WorkerIdChanged {
                instance_id,
                worker_id,
            } => {
                if instance_id != self_id {
                    self.instance
                        .update_peer(&instance_id, |peer| peer.worker_id = worker_id)
                        .await;
                }
            }
            ClusterEvent::ClusterStateChanged { state } => {
                info!("Cluster state changed to {}", state);
                self.instance.set_cluster_state(state).await;
            }
            ClusterEvent::DataSourceStateChanged { qualified, state } => {
                let known = self
                    .metadata
                    .set_data_source_enabled(
                        &qualified.database,
                        &qualified.group_name,
                        &qualified.data_source,
                        state.is_enabled(),
                    )
                    .await;
                if known {
                    info!("Data source {} is {}", qualified, state);
                } else {
                    debug!("Recorded state {} of unknown data source {}", state, qualified);
                }
            }
            ClusterEvent::RuleItemChanged { database, rules } => {
                match RuleMetaData::from_configurations(&rules) {
                    Ok(rule_metadata) => {
                        self.metadata.put_database(&database, rule_metadata).await;
                        info!("Applied {} rules to database {}", rules.len(), database);
                    }
                    Err(e) => warn!("Rejected rule change for {}: {}", database, e),
                }
            }
            ClusterEvent::TableChanged {
                database,
                table_name,
                table,
            } => {
                let Some(db) = self.metadata.database(&database).await else {
                    debug!("Ignoring table change for unknown database {}", database);
                    return;
                };
                match table {
                    Some(table) => {
                        if db.apply_remote_table(table).await {
                            debug!("Applied remote metadata of {}.{}", database, table_name);
                        }
                    }
                    None => {
                        db.remove_table(&table_name).await;
                    }
                }
            }
        }
    }
}
