//! Type definitions for the registry client layer

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

/// Kind of change observed on a registry key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Updated,
    Deleted,
}

/// A change to a single registry key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataChangedEvent {
    pub key: String,
    /// New value, or the last value for deletions
    pub value: String,
    pub kind: ChangeKind,
}

impl DataChangedEvent {
    pub fn new(key: impl Into<String>, value: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            kind,
        }
    }
}

/// Connection status of a registry backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Health report of a registry backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub backend_type: String,
    pub connection_status: ConnectionStatus,
    pub errors: Vec<String>,
}

/// Subscription to changes below a key prefix
pub struct RegistryWatch {
    prefix: String,
    receiver: broadcast::Receiver<DataChangedEvent>,
}

impl RegistryWatch {
    pub fn new(prefix: impl Into<String>, receiver: broadcast::Receiver<DataChangedEvent>) -> Self {
        Self {
            prefix: prefix.into(),
            receiver,
        }
    }

    /// Prefix this watch is filtered on
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Wait for the next change below the prefix; `None` once the backend is gone
    pub async fn next(&mut self) -> Option<DataChangedEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if event.key.starts_with(&self.prefix) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(
                        "Registry watch on {} lagged, {} changes skipped",
                        self.prefix, skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

/// Join registry path segments with `/`
pub fn join_path(parent: &str, child: &str) -> String {
    format!("{}/{}", parent.trim_end_matches('/'), child)
}
