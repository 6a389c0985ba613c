//! Translation of registry changes into cluster events

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::event::{ClusterEvent, EventBusContext};
use super::node_path::{self, ComputeNodePath};
use crate::metadata::MetadataPath;
use crate::registry::{ChangeKind, ClusterRepository, DataChangedEvent, RegistryResult, RegistryWatch};

/// Registry prefixes a node subscribes to
pub const WATCHED_PREFIXES: [&str; 3] = ["/nodes", "/states", "/metadata"];

fn decode<T: DeserializeOwned>(event: &DataChangedEvent) -> Option<T> {
    match serde_json::from_str(&event.value) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring undecodable value at {}: {}", event.key, e);
            None
        }
    }
}

/// Map one registry change to the cluster event it represents, if any
pub fn to_cluster_event(event: &DataChangedEvent) -> Option<ClusterEvent> {
    let deleted = event.kind == ChangeKind::Deleted;

    if let Some(path) = ComputeNodePath::parse(&event.key) {
        return match path {
            ComputeNodePath::Online { instance_id, .. } if deleted => {
                Some(ClusterEvent::InstanceOffline { instance_id })
            }
            ComputeNodePath::Online { .. } => decode(event)
                .map(|instance| ClusterEvent::InstanceOnline { instance }),
            ComputeNodePath::Labels { instance_id } => {
                let labels = if deleted { Some(Vec::new()) } else { decode(event) };
                labels.map(|labels| ClusterEvent::LabelsChanged {
                    instance_id,
                    labels,
                })
            }
            ComputeNodePath::Status { instance_id } => {
                let state = if deleted { Some(Default::default()) } else { decode(event) };
                state.map(|state| ClusterEvent::InstanceStateChanged { instance_id, state })
            }
            ComputeNodePath::WorkerId { instance_id } => {
                let worker_id = if deleted { Some(None) } else { decode(event).map(Some) };
                worker_id.map(|worker_id| ClusterEvent::WorkerIdChanged {
                    instance_id,
                    worker_id,
                })
            }
        };
    }

    if let Some(qualified) = node_path::parse_qualified_data_source_path(&event.key) {
        let state = if deleted { Some(Default::default()) } else { decode(event) };
        return state.map(|state| ClusterEvent::DataSourceStateChanged { qualified, state });
    }

    if event.key == node_path::cluster_state_path() {
        if deleted {
            return None;
        }
        return decode(event).map(|state| ClusterEvent::ClusterStateChanged { state });
    }

    match MetadataPath::parse(&event.key)? {
        // Rules are replaced, never removed
        MetadataPath::Rules { .. } if deleted => None,
        MetadataPath::Rules { database } => {
            decode(event).map(|rules| ClusterEvent::RuleItemChanged { database, rules })
        }
        MetadataPath::Table { database, table } if deleted => Some(ClusterEvent::TableChanged {
            database,
            table_name: table,
            table: None,
        }),
        MetadataPath::Table { database, table } => {
            decode(event).map(|metadata| ClusterEvent::TableChanged {
                database,
                table_name: table,
                table: Some(metadata),
            })
        }
    }
}

/// Background tasks forwarding registry changes onto the event bus
pub struct RegistryWatcher {
    tasks: JoinSet<()>,
    shutdown: CancellationToken,
}

impl RegistryWatcher {
    /// Open the watches without forwarding yet.
    ///
    /// Changes made after this returns are buffered until [`Self::start`].
    pub async fn open(repository: &Arc<dyn ClusterRepository>) -> RegistryResult<Vec<RegistryWatch>> {
        let mut watches = Vec::with_capacity(WATCHED_PREFIXES.len());
        for prefix in WATCHED_PREFIXES {
            watches.push(repository.watch(prefix).await?);
        }
        Ok(watches)
    }

    /// Forward buffered and future changes until `shutdown` is cancelled
    pub fn start(
        watches: Vec<RegistryWatch>,
        event_bus: EventBusContext,
        shutdown: CancellationToken,
    ) -> Self {
        let mut tasks = JoinSet::new();

        for mut watch in watches {
            let bus = event_bus.clone();
            let stop = shutdown.clone();
            tasks.spawn(async move {
                loop {
                    tokio::select! {
                        biased;
                        _ = stop.cancelled() => break,
                        change = watch.next() => match change {
                            Some(change) => {
                                if let Some(event) = to_cluster_event(&change) {
                                    bus.post(event);
                                }
                            }
                            None => {
                                debug!("Registry watch on {} closed", watch.prefix());
                                break;
                            }
                        },
                    }
                }
            });
        }

        Self { tasks, shutdown }
    }

    pub async fn stop(mut self) {
        self.shutdown.cancel();
        while self.tasks.join_next().await.is_some() {}
    }
}
