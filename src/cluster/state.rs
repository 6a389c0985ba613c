use serde::{Deserialize, Serialize};
use std::fmt;

/// Cluster-wide operating state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterState {
    #[default]
    Ok,
    /// Writes are refused cluster-wide
    ReadOnly,
    Unavailable,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClusterState::Ok => "ok",
            ClusterState::ReadOnly => "read_only",
            ClusterState::Unavailable => "unavailable",
        };
        f.write_str(name)
    }
}
