//! Node configuration
//!
//! A node is configured from a single file (TOML, YAML or JSON, picked by
//! extension), then `SHARDCORE_*` environment variables, then validation.
//! Every section has defaults, so an empty file is a valid standalone config;
//! cluster mode additionally needs `mode.repository`.
//!
//! ```yaml
//! mode:
//!   repository:
//!     type: memory
//!     namespace: orders
//!     lease_ttl: 10s
//! instance:
//!   instance_type: proxy
//!   port: 3307
//! databases:
//!   - name: sharding_db
//!     rules:
//!       - type: sharding
//!         tables:
//!           - logic_table: t_order
//!             actual_data_nodes: [ds_0.t_order_0, ds_1.t_order_1]
//! ```

pub mod error;
pub mod loader;

pub use error::{ConfigError, ConfigIssue, ConfigResult};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use uuid::Uuid;

use crate::cluster::instance::{InstanceMetaData, InstanceType};
use crate::cluster::worker_id::DEFAULT_MAX_WORKER_ID;
use crate::executor::DEFAULT_MAX_CONCURRENCY;
use crate::registry::RepositoryConfig;
use crate::rule::RuleConfiguration;

/// Valid log levels for configuration validation.
pub const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub mode: ModeConfig,
    #[serde(default)]
    pub instance: InstanceConfig,
    #[serde(default)]
    pub worker_id: WorkerIdConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub databases: Vec<DatabaseConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModeConfig {
    /// Cluster repository; required to start in cluster mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    #[serde(default = "default_instance_id")]
    pub id: String,
    #[serde(default = "default_instance_type")]
    pub instance_type: InstanceType,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

fn default_instance_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_instance_type() -> InstanceType {
    InstanceType::Proxy
}

fn default_host() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

fn default_port() -> u16 {
    3307
}

fn default_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            id: default_instance_id(),
            instance_type: default_instance_type(),
            host: default_host(),
            port: default_port(),
            version: default_version(),
            labels: Vec::new(),
        }
    }
}

impl InstanceConfig {
    pub fn metadata(&self) -> InstanceMetaData {
        InstanceMetaData {
            id: self.id.clone(),
            instance_type: self.instance_type,
            host: self.host.clone(),
            port: self.port,
            version: self.version.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerIdConfig {
    /// Inclusive upper bound of the claim range
    #[serde(default = "default_max_worker_id")]
    pub max_worker_id: u32,
    #[serde(with = "humantime_serde", default = "default_allocation_timeout")]
    pub allocation_timeout: Duration,
}

fn default_max_worker_id() -> u32 {
    DEFAULT_MAX_WORKER_ID
}

fn default_allocation_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for WorkerIdConfig {
    fn default() -> Self {
        Self {
            max_worker_id: default_max_worker_id(),
            allocation_timeout: default_allocation_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(with = "humantime_serde", default = "default_lock_timeout")]
    pub default_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_lock_retry_delay")]
    pub retry_delay: Duration,
}

fn default_lock_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_lock_retry_delay() -> Duration {
    Duration::from_millis(50)
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_timeout: default_lock_timeout(),
            retry_delay: default_lock_retry_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Groups of one statement allowed in flight at once
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Local rule configuration of one logical database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleConfiguration>,
}

impl NodeConfig {
    /// Configuration for a cluster node on `repository`
    pub fn cluster(repository: RepositoryConfig) -> Self {
        Self {
            mode: ModeConfig {
                repository: Some(repository),
            },
            ..Default::default()
        }
    }

    /// Check every value, reporting all problems at once
    pub fn validate(&self) -> ConfigResult<()> {
        let mut issues = Vec::new();

        if let Some(repository) = &self.mode.repository {
            if let Err(e) = repository.validate() {
                issues.push(ConfigIssue::new("mode.repository", e.to_string()));
            }
            if repository.retry_delay.is_zero() {
                issues.push(ConfigIssue::new(
                    "mode.repository.retry_delay",
                    "must be greater than zero",
                ));
            }
        }

        if self.instance.id.trim().is_empty() {
            issues.push(ConfigIssue::new("instance.id", "must not be empty"));
        }
        if self.worker_id.allocation_timeout.is_zero() {
            issues.push(ConfigIssue::new(
                "worker_id.allocation_timeout",
                "must be greater than zero",
            ));
        }
        if self.lock.default_timeout.is_zero() {
            issues.push(ConfigIssue::new("lock.default_timeout", "must be greater than zero"));
        }
        if self.lock.retry_delay.is_zero() {
            issues.push(ConfigIssue::new("lock.retry_delay", "must be greater than zero"));
        }
        if self.executor.max_concurrency == 0 {
            issues.push(ConfigIssue::new(
                "executor.max_concurrency",
                "must be greater than zero",
            ));
        }
        if !VALID_LOG_LEVELS.contains(&self.log.level.to_lowercase().as_str()) {
            issues.push(ConfigIssue::new(
                "log.level",
                format!("must be one of: {}", VALID_LOG_LEVELS.join(", ")),
            ));
        }

        let mut names = HashSet::new();
        for (index, database) in self.databases.iter().enumerate() {
            if database.name.trim().is_empty() {
                issues.push(ConfigIssue::new(
                    format!("databases[{}].name", index),
                    "must not be empty",
                ));
            } else if !names.insert(database.name.as_str()) {
                issues.push(ConfigIssue::new(
                    format!("databases[{}].name", index),
                    format!("duplicate database '{}'", database.name),
                ));
            }
            for (rule_index, rule) in database.rules.iter().enumerate() {
                if let Err(e) = rule.validate() {
                    issues.push(ConfigIssue::new(
                        format!("databases[{}].rules[{}]", index, rule_index),
                        e.to_string(),
                    ));
                }
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }
}
