//! Compute node identity

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceType {
    Proxy,
    Jdbc,
}

impl InstanceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceType::Proxy => "proxy",
            InstanceType::Jdbc => "jdbc",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "proxy" => Ok(InstanceType::Proxy),
            "jdbc" => Ok(InstanceType::Jdbc),
            other => Err(format!("unknown instance type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    #[default]
    Ok,
    /// Instance refuses traffic
    CircuitBreak,
}

/// Static description of a compute node, written to its online record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetaData {
    pub id: String,
    pub instance_type: InstanceType,
    pub host: String,
    pub port: u16,
    pub version: String,
}

impl InstanceMetaData {
    /// `host@port`
    pub fn attributes(&self) -> String {
        format!("{}@{}", self.host, self.port)
    }
}

/// A compute node as seen by the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNodeInstance {
    pub metadata: InstanceMetaData,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub state: InstanceState,
    #[serde(default)]
    pub worker_id: Option<u32>,
}

impl ComputeNodeInstance {
    pub fn new(metadata: InstanceMetaData) -> Self {
        Self {
            metadata,
            labels: Vec::new(),
            state: InstanceState::Ok,
            worker_id: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}
