//! Registry key layout for compute nodes, replica states, cluster state and global locks

use super::data_source::QualifiedDataSource;
use super::instance::InstanceType;

pub const COMPUTE_NODES_ROOT: &str = "/nodes/compute_nodes";
const QUALIFIED_DATA_SOURCES_ROOT: &str = "/nodes/qualified_data_sources";
const WORKER_ID_RESERVATION_ROOT: &str = "/reservation/worker_id";
const CLUSTER_STATE_PATH: &str = "/states/cluster_state";
const GLOBAL_LOCKS_ROOT: &str = "/lock/global/locks";

pub fn online_root() -> String {
    format!("{}/online", COMPUTE_NODES_ROOT)
}

pub fn online_type_root(instance_type: InstanceType) -> String {
    format!("{}/{}", online_root(), instance_type)
}

pub fn online_path(instance_type: InstanceType, instance_id: &str) -> String {
    format!("{}/{}", online_type_root(instance_type), instance_id)
}

pub fn labels_path(instance_id: &str) -> String {
    format!("{}/labels/{}", COMPUTE_NODES_ROOT, instance_id)
}

pub fn status_path(instance_id: &str) -> String {
    format!("{}/status/{}", COMPUTE_NODES_ROOT, instance_id)
}

pub fn worker_id_path(instance_id: &str) -> String {
    format!("{}/worker_id/{}", COMPUTE_NODES_ROOT, instance_id)
}

pub fn qualified_data_sources_root() -> &'static str {
    QUALIFIED_DATA_SOURCES_ROOT
}

pub fn qualified_data_source_path(qualified: &QualifiedDataSource) -> String {
    format!("{}/{}", QUALIFIED_DATA_SOURCES_ROOT, qualified)
}

/// The replica a state record belongs to
pub fn parse_qualified_data_source_path(key: &str) -> Option<QualifiedDataSource> {
    let name = key
        .strip_prefix(QUALIFIED_DATA_SOURCES_ROOT)?
        .strip_prefix('/')?;
    QualifiedDataSource::parse(name)
}

pub fn worker_id_reservation_path(worker_id: u32) -> String {
    format!("{}/{}", WORKER_ID_RESERVATION_ROOT, worker_id)
}

pub fn cluster_state_path() -> &'static str {
    CLUSTER_STATE_PATH
}

pub fn global_lock_path(name: &str) -> String {
    format!("{}/{}", GLOBAL_LOCKS_ROOT, name)
}

/// Key below the compute nodes root
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeNodePath {
    Online {
        instance_type: InstanceType,
        instance_id: String,
    },
    Labels {
        instance_id: String,
    },
    Status {
        instance_id: String,
    },
    WorkerId {
        instance_id: String,
    },
}

impl ComputeNodePath {
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(COMPUTE_NODES_ROOT)?.strip_prefix('/')?;
        let segments: Vec<&str> = rest.split('/').collect();
        match segments.as_slice() {
            ["online", instance_type, id] => Some(Self::Online {
                instance_type: instance_type.parse().ok()?,
                instance_id: id.to_string(),
            }),
            ["labels", id] => Some(Self::Labels {
                instance_id: id.to_string(),
            }),
            ["status", id] => Some(Self::Status {
                instance_id: id.to_string(),
            }),
            ["worker_id", id] => Some(Self::WorkerId {
                instance_id: id.to_string(),
            }),
            _ => None,
        }
    }
}
