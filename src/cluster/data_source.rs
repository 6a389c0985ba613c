//! Cluster-wide enabled state of read-write splitting replicas

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::node_path;
use crate::registry::{ClusterRepository, RegistryResult};

/// A replica addressed as `database.group.data_source`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedDataSource {
    pub database: String,
    pub group_name: String,
    pub data_source: String,
}

impl QualifiedDataSource {
    pub fn new(
        database: impl Into<String>,
        group_name: impl Into<String>,
        data_source: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            group_name: group_name.into(),
            data_source: data_source.into(),
        }
    }

    /// Parse `database.group.data_source`; every part must be non-empty
    pub fn parse(value: &str) -> Option<Self> {
        let parts: Vec<&str> = value.split('.').collect();
        match parts.as_slice() {
            [database, group, data_source]
                if !database.is_empty() && !group.is_empty() && !data_source.is_empty() =>
            {
                Some(Self::new(*database, *group, *data_source))
            }
            _ => None,
        }
    }
}

impl fmt::Display for QualifiedDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.database, self.group_name, self.data_source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSourceState {
    #[default]
    Enabled,
    Disabled,
}

impl DataSourceState {
    pub fn is_enabled(self) -> bool {
        self == DataSourceState::Enabled
    }
}

impl fmt::Display for DataSourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceState::Enabled => write!(f, "enabled"),
            DataSourceState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Replica state records under `/nodes/qualified_data_sources`.
///
/// The records are persistent: an operator's decision outlives the node
/// that wrote it.
pub struct QualifiedDataSourceStatusService {
    repository: Arc<dyn ClusterRepository>,
}

impl QualifiedDataSourceStatusService {
    pub fn new(repository: Arc<dyn ClusterRepository>) -> Self {
        Self { repository }
    }

    pub async fn persist_status(
        &self,
        qualified: &QualifiedDataSource,
        state: DataSourceState,
    ) -> RegistryResult<()> {
        self.repository
            .persist_json(&node_path::qualified_data_source_path(qualified), &state)
            .await
    }

    /// Every recorded replica state; malformed records are skipped
    pub async fn load_status(&self) -> RegistryResult<BTreeMap<QualifiedDataSource, DataSourceState>> {
        let root = node_path::qualified_data_sources_root();
        let mut states = BTreeMap::new();

        for name in self.repository.get_children_keys(root).await? {
            let Some(qualified) = QualifiedDataSource::parse(&name) else {
                warn!("Ignoring malformed data source record {}/{}", root, name);
                continue;
            };
            let key = node_path::qualified_data_source_path(&qualified);
            match self.repository.get_json::<DataSourceState>(&key).await {
                Ok(Some(state)) => {
                    states.insert(qualified, state);
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => return Err(e),
                Err(e) => warn!("Skipping unreadable data source record {}: {}", key, e),
            }
        }

        debug!("Loaded {} data source states", states.len());
        Ok(states)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryRegistry;
    use std::time::Duration;

    #[test]
    fn test_parse_qualified_names() {
        let qualified = QualifiedDataSource::parse("sharding_db.rw.replica_0").unwrap();
        assert_eq!(qualified, QualifiedDataSource::new("sharding_db", "rw", "replica_0"));
        assert_eq!(qualified.to_string(), "sharding_db.rw.replica_0");

        assert_eq!(QualifiedDataSource::parse("db.rw"), None);
        assert_eq!(QualifiedDataSource::parse("db..replica"), None);
        assert_eq!(QualifiedDataSource::parse("a.b.c.d"), None);
    }

    #[tokio::test]
    async fn test_load_status_skips_malformed_records() {
        let server = MemoryRegistry::new("data-source-status");
        let repository: Arc<dyn ClusterRepository> =
            Arc::new(server.connect(Duration::from_secs(30)).await.unwrap());
        let service = QualifiedDataSourceStatusService::new(repository.clone());
        let replica = QualifiedDataSource::new("db", "rw", "replica_0");

        service
            .persist_status(&replica, DataSourceState::Disabled)
            .await
            .unwrap();
        repository
            .persist(
                &format!("{}/not-qualified", node_path::qualified_data_sources_root()),
                "\"disabled\"",
            )
            .await
            .unwrap();
        repository
            .persist(
                &format!("{}/db.rw.replica_1", node_path::qualified_data_sources_root()),
                "garbage",
            )
            .await
            .unwrap();

        let states = service.load_status().await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(states.get(&replica), Some(&DataSourceState::Disabled));

        // Persistent records outlive the writer
        repository.close().await.unwrap();
        let reader = QualifiedDataSourceStatusService::new(Arc::new(
            server.connect(Duration::from_secs(30)).await.unwrap(),
        ));
        assert_eq!(reader.load_status().await.unwrap().len(), 1);
    }
}
