//! Error types for statement execution

use crate::error::{ErrorCode, ShardError};
use crate::metadata::MetadataError;
use thiserror::Error;

pub type ExecutionResult<T> = Result<T, ExecutionError>;

#[derive(Error, Debug)]
pub enum ExecutionError {
    /// A callback failed on one execution unit; the whole statement fails
    #[error("Execution on {data_source} failed for `{sql}`: {source}")]
    UnitFailed {
        data_source: String,
        sql: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Process {process_id} was cancelled")]
    Cancelled { process_id: String },

    #[error("Unknown database {0}")]
    UnknownDatabase(String),

    /// Units ran but cached metadata could not be brought up to date
    #[error("Metadata refresh failed: {0}")]
    Refresh(#[from] MetadataError),

    #[error("Execution task panicked: {0}")]
    TaskPanicked(String),
}

impl ExecutionError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

impl From<ExecutionError> for ShardError {
    fn from(err: ExecutionError) -> Self {
        let (code, process_id) = match &err {
            ExecutionError::UnitFailed { .. } => (ErrorCode::EXEC_UNIT_FAILED, None),
            ExecutionError::Cancelled { process_id } => {
                (ErrorCode::EXEC_CANCELLED, Some(process_id.clone()))
            }
            ExecutionError::UnknownDatabase(_) => (ErrorCode::EXEC_UNKNOWN_DATABASE, None),
            ExecutionError::Refresh(_) => (ErrorCode::EXEC_REFRESH_FAILED, None),
            ExecutionError::TaskPanicked(_) => (ErrorCode::EXEC_TASK_PANICKED, None),
        };

        ShardError::execution_with_code(code, err.to_string(), process_id).with_source(err)
    }
}
