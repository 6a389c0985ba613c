//! Cluster coordination
//!
//! A node joins the cluster through [`ClusterContextManagerBuilder`]: it
//! attaches the configured repository, claims a worker id, registers itself
//! online and subscribes to changes published by its peers. The resulting
//! [`ContextManager`] owns the node's [`InstanceContext`] and hands out
//! executors bound to the cluster-consistent rule set.
//!
//! Registry changes flow one way: the [`watcher`] turns them into
//! [`ClusterEvent`]s on the node's [`EventBusContext`], and the
//! [`subscriber`] applies them. Nothing else mutates the peer set.

pub mod builder;
pub mod context;
pub mod context_manager;
pub mod data_source;
pub mod error;
pub mod event;
pub mod global;
pub mod instance;
pub mod lock;
pub mod node_path;
pub mod registry_center;
pub mod state;
pub mod subscriber;
pub mod watcher;
pub mod worker_id;

pub use builder::ClusterContextManagerBuilder;
pub use context::InstanceContext;
pub use context_manager::ContextManager;
pub use data_source::{DataSourceState, QualifiedDataSource, QualifiedDataSourceStatusService};
pub use error::{ClusterError, ClusterResult};
pub use event::{ClusterEvent, EventBusContext};
pub use instance::{ComputeNodeInstance, InstanceMetaData, InstanceState, InstanceType};
pub use lock::{GlobalLockContext, CLUSTER_STATE_LOCK, METADATA_LOCK};
pub use registry_center::{ClusterStatusService, ComputeNodeStatusService, RegistryCenter};
pub use state::ClusterState;
pub use subscriber::ClusterSubscriber;
pub use watcher::{to_cluster_event, RegistryWatcher};
pub use worker_id::{ClusterWorkerIdGenerator, DEFAULT_MAX_WORKER_ID};
