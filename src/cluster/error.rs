//! Error types for cluster coordination

use std::time::Duration;
use thiserror::Error;

use crate::error::{ErrorCode, ShardError};
use crate::metadata::MetadataError;
use crate::registry::RegistryError;

pub type ClusterResult<T> = Result<T, ClusterError>;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Cluster mode requires a repository configuration")]
    MissingRepository,

    #[error("Repository error: {0}")]
    Registry(#[from] RegistryError),

    #[error("No free worker id in range 0..={max}")]
    WorkerIdExhausted { max: u32 },

    #[error("Worker id allocation timed out after {0:?}")]
    WorkerIdTimeout(Duration),

    #[error("Failed to register instance {instance_id}: {reason}")]
    Registration { instance_id: String, reason: String },

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Instance context is already installed")]
    AlreadyInitialized,

    #[error("Global lock {name} not acquired within {timeout:?}")]
    LockTimeout { name: String, timeout: Duration },
}

impl From<ClusterError> for ShardError {
    fn from(err: ClusterError) -> Self {
        let code = match &err {
            ClusterError::MissingRepository => ErrorCode::CLUSTER_MISSING_REPOSITORY,
            ClusterError::Registry(_) => ErrorCode::CLUSTER_REGISTRATION_FAILED,
            ClusterError::WorkerIdExhausted { .. } => ErrorCode::CLUSTER_WORKER_ID_EXHAUSTED,
            ClusterError::WorkerIdTimeout(_) => ErrorCode::CLUSTER_WORKER_ID_TIMEOUT,
            ClusterError::Registration { .. } => ErrorCode::CLUSTER_REGISTRATION_FAILED,
            ClusterError::Metadata(_) => ErrorCode::CLUSTER_GENERIC,
            ClusterError::AlreadyInitialized => ErrorCode::CLUSTER_ALREADY_INITIALIZED,
            ClusterError::LockTimeout { .. } => ErrorCode::CLUSTER_GENERIC,
        };
        ShardError::cluster_with_code(code, err.to_string()).with_source(err)
    }
}
