//! Cluster-wide change events and the node-local bus carrying them

use tokio::sync::broadcast;
use tracing::trace;

use super::data_source::{DataSourceState, QualifiedDataSource};
use super::instance::{InstanceMetaData, InstanceState};
use super::state::ClusterState;
use crate::metadata::TableMetaData;
use crate::rule::RuleConfiguration;

const EVENT_BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum ClusterEvent {
    InstanceOnline {
        instance: InstanceMetaData,
    },
    InstanceOffline {
        instance_id: String,
    },
    LabelsChanged {
        instance_id: String,
        labels: Vec<String>,
    },
    InstanceStateChanged {
        instance_id: String,
        state: InstanceState,
    },
    /// `worker_id` is `None` when the claim was released
    WorkerIdChanged {
        instance_id: String,
        worker_id: Option<u32>,
    },
    ClusterStateChanged {
        state: ClusterState,
    },
    /// A removed record reads as `Enabled`
    DataSourceStateChanged {
        qualified: QualifiedDataSource,
        state: DataSourceState,
    },
    RuleItemChanged {
        database: String,
        rules: Vec<RuleConfiguration>,
    },
    /// `table` is `None` when the table was dropped
    TableChanged {
        database: String,
        table_name: String,
        table: Option<TableMetaData>,
    },
}

/// Node-local broadcast bus; posting never blocks
#[derive(Clone)]
pub struct EventBusContext {
    sender: broadcast::Sender<ClusterEvent>,
}

impl Default for EventBusContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBusContext {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self { sender }
    }

    /// Post an event, returning how many subscribers will see it
    pub fn post(&self, event: ClusterEvent) -> usize {
        trace!("Posting cluster event {:?}", event);
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClusterEvent> {
        self.sender.subscribe()
    }
}
