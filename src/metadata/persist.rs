//! Write-through of rules and table metadata to the registry

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::error::{MetadataError, MetadataResult};
use super::table::TableMetaData;
use crate::registry::ClusterRepository;
use crate::rule::RuleConfiguration;

const METADATA_ROOT: &str = "/metadata";

pub fn metadata_root() -> &'static str {
    METADATA_ROOT
}

pub fn rules_path(database: &str) -> String {
    format!("{}/{}/rules", METADATA_ROOT, database)
}

pub fn tables_path(database: &str) -> String {
    format!("{}/{}/tables", METADATA_ROOT, database)
}

pub fn table_path(database: &str, table: &str) -> String {
    format!("{}/{}", tables_path(database), table.to_lowercase())
}

/// Metadata key below `/metadata`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataPath {
    Rules { database: String },
    Table { database: String, table: String },
}

impl MetadataPath {
    pub fn parse(key: &str) -> Option<Self> {
        let rest = key.strip_prefix(METADATA_ROOT)?.strip_prefix('/')?;
        let segments: Vec<&str> = rest.split('/').collect();
        match segments.as_slice() {
            [database, "rules"] => Some(Self::Rules {
                database: database.to_string(),
            }),
            [database, "tables", table] => Some(Self::Table {
                database: database.to_string(),
                table: table.to_string(),
            }),
            _ => None,
        }
    }
}

/// Durable storage of rules and table metadata
#[async_trait]
pub trait MetaDataPersistService: Send + Sync {
    async fn persist_rules(&self, database: &str, rules: &[RuleConfiguration]) -> MetadataResult<()>;

    async fn load_rules(&self, database: &str) -> MetadataResult<Option<Vec<RuleConfiguration>>>;

    async fn persist_table(&self, database: &str, table: &TableMetaData) -> MetadataResult<()>;

    async fn drop_table(&self, database: &str, table: &str) -> MetadataResult<()>;

    async fn load_tables(&self, database: &str) -> MetadataResult<Vec<TableMetaData>>;
}

/// Persists metadata below `/metadata` in the cluster repository
pub struct RegistryMetaDataPersistService {
    repository: Arc<dyn ClusterRepository>,
}

impl RegistryMetaDataPersistService {
    pub fn new(repository: Arc<dyn ClusterRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl MetaDataPersistService for RegistryMetaDataPersistService {
    async fn persist_rules(&self, database: &str, rules: &[RuleConfiguration]) -> MetadataResult<()> {
        self.repository
            .persist_json(&rules_path(database), &rules)
            .await
            .map_err(|e| MetadataError::persist(database, e))
    }

    async fn load_rules(&self, database: &str) -> MetadataResult<Option<Vec<RuleConfiguration>>> {
        self.repository
            .get_json(&rules_path(database))
            .await
            .map_err(|e| MetadataError::persist(database, e))
    }

    async fn persist_table(&self, database: &str, table: &TableMetaData) -> MetadataResult<()> {
        debug!(
            "Persisting table {}.{} version {}",
            database, table.name, table.version
        );
        self.repository
            .persist_json(&table_path(database, &table.name), table)
            .await
            .map_err(|e| MetadataError::persist(database, e))
    }

    async fn drop_table(&self, database: &str, table: &str) -> MetadataResult<()> {
        self.repository
            .delete(&table_path(database, table))
            .await
            .map_err(|e| MetadataError::persist(database, e))
    }

    async fn load_tables(&self, database: &str) -> MetadataResult<Vec<TableMetaData>> {
        let names = self
            .repository
            .get_children_keys(&tables_path(database))
            .await
            .map_err(|e| MetadataError::persist(database, e))?;

        let mut tables = Vec::with_capacity(names.len());
        for name in names {
            let table = self
                .repository
                .get_json::<TableMetaData>(&table_path(database, &name))
                .await
                .map_err(|e| MetadataError::persist(database, e))?;
            tables.extend(table);
        }
        Ok(tables)
    }
}

/// Persist service that keeps nothing, for standalone nodes
#[derive(Clone, Default)]
pub struct NoopMetaDataPersistService;

impl NoopMetaDataPersistService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetaDataPersistService for NoopMetaDataPersistService {
    async fn persist_rules(&self, _database: &str, _rules: &[RuleConfiguration]) -> MetadataResult<()> {
        Ok(())
    }

    async fn load_rules(&self, _database: &str) -> MetadataResult<Option<Vec<RuleConfiguration>>> {
        Ok(None)
    }

    async fn persist_table(&self, _database: &str, _table: &TableMetaData) -> MetadataResult<()> {
        Ok(())
    }

    async fn drop_table(&self, _database: &str, _table: &str) -> MetadataResult<()> {
        Ok(())
    }

    async fn load_tables(&self, _database: &str) -> MetadataResult<Vec<TableMetaData>> {
        Ok(Vec::new())
    }
}
