use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::table::TableMetaData;
use crate::rule::RuleMetaData;

/// One logical database: its active rules and cached schema
pub struct Database {
    name: String,
    rules: RwLock<Arc<RuleMetaData>>,
    /// Keyed by lower-case table name
    tables: RwLock<HashMap<String, TableMetaData>>,
}

impl Database {
    pub fn new(name: impl Into<String>, rules: RuleMetaData) -> Self {
        Self {
            name: name.into(),
            rules: RwLock::new(Arc::new(rules)),
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules active right now
    pub async fn rule_metadata(&self) -> Arc<RuleMetaData> {
        self.rules.read().await.clone()
    }

    pub async fn replace_rules(&self, rules: RuleMetaData) {
        *self.rules.write().await = Arc::new(rules);
    }

    /// Swap in a modified copy of the active rules
    pub async fn update_rules<F, R>(&self, update: F) -> R
    where
        F: FnOnce(&mut RuleMetaData) -> R,
    {
        let mut current = self.rules.write().await;
        let mut rules = RuleMetaData::clone(&current);
        let result = update(&mut rules);
        *current = Arc::new(rules);
        result
    }

    pub async fn table(&self, name: &str) -> Option<TableMetaData> {
        self.tables.read().await.get(&name.to_lowercase()).cloned()
    }

    pub async fn tables(&self) -> Vec<TableMetaData> {
        let mut tables: Vec<_> = self.tables.read().await.values().cloned().collect();
        tables.sort_by(|a, b| a.name.cmp(&b.name));
        tables
    }

    pub async fn put_table(&self, table: TableMetaData) {
        self.tables
            .write()
            .await
            .insert(table.name.to_lowercase(), table);
    }

    pub async fn remove_table(&self, name: &str) -> Option<TableMetaData> {
        self.tables.write().await.remove(&name.to_lowercase())
    }

    /// Apply a table published by a peer if it is newer than the cached one
    pub async fn apply_remote_table(&self, table: TableMetaData) -> bool {
        let mut tables = self.tables.write().await;
        let key = table.name.to_lowercase();
        let newer = tables.get(&key).map_or(true, |cached| {
            table.version > cached.version
                || (table.version == cached.version && table.auto_increment > cached.auto_increment)
        });
        if newer {
            tables.insert(key, table);
        }
        newer
    }
}

/// `(group, data source)` pairs disabled in one database
type DisabledDataSources = BTreeSet<(String, String)>;

/// All logical databases known to this node.
///
/// Disabled replicas are remembered per database, so they stay disabled
/// across rule replacement and for databases created later.
#[derive(Default)]
pub struct MetaDataContexts {
    databases: RwLock<HashMap<String, Arc<Database>>>,
    disabled_data_sources: RwLock<HashMap<String, DisabledDataSources>>,
}

impl MetaDataContexts {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn database(&self, name: &str) -> Option<Arc<Database>> {
        self.databases.read().await.get(name).cloned()
    }

    /// Add a database, or replace the rules of an existing one
    pub async fn put_database(&self, name: &str, mut rules: RuleMetaData) -> Arc<Database> {
        if let Some(disabled) = self.disabled_data_sources.read().await.get(name) {
            for (group, data_source) in disabled {
                rules.set_data_source_enabled(group, data_source, false);
            }
        }

        let mut databases = self.databases.write().await;
        if let Some(existing) = databases.get(name) {
            existing.replace_rules(rules).await;
            return existing.clone();
        }
        let database = Arc::new(Database::new(name, rules));
        databases.insert(name.to_string(), database.clone());
        database
    }

    /// Record the state of a replica and apply it to the database's rules.
    ///
    /// Returns whether an active rule knows the replica.
    pub async fn set_data_source_enabled(
        &self,
        database: &str,
        group: &str,
        data_source: &str,
        enabled: bool,
    ) -> bool {
        {
            let mut states = self.disabled_data_sources.write().await;
            let key = (group.to_string(), data_source.to_string());
            if enabled {
                if let Some(disabled) = states.get_mut(database) {
                    disabled.remove(&key);
                }
            } else {
                states.entry(database.to_string()).or_default().insert(key);
            }
        }

        match self.database(database).await {
            Some(db) => {
                db.update_rules(|rules| rules.set_data_source_enabled(group, data_source, enabled))
                    .await
            }
            None => false,
        }
    }

    pub async fn database_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.databases.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{ReadwriteSplittingDataSourceConfiguration, RuleConfiguration};

    #[tokio::test]
    async fn test_remote_table_applies_only_when_newer() {
        let database = Database::new("db", RuleMetaData::default());
        let mut table = TableMetaData::new("t_order", vec![], vec![]);
        table.version = 3;
        database.put_table(table.clone()).await;

        let mut stale = table.clone();
        stale.version = 2;
        assert!(!database.apply_remote_table(stale).await);

        let mut newer = table.clone();
        newer.version = 4;
        assert!(database.apply_remote_table(newer).await);
        assert_eq!(database.table("T_ORDER").await.map(|t| t.version), Some(4));
    }

    #[tokio::test]
    async fn test_put_database_keeps_cached_tables() {
        let contexts = MetaDataContexts::new();
        let database = contexts.put_database("db", RuleMetaData::default()).await;
        database
            .put_table(TableMetaData::new("t_user", vec![], vec![]))
            .await;

        let again = contexts.put_database("db", RuleMetaData::default()).await;
        assert!(again.table("t_user").await.is_some());
        assert_eq!(contexts.database_names().await, vec!["db".to_string()]);
        assert!(contexts.database("other").await.is_none());
    }

    #[tokio::test]
    async fn test_disabled_replica_survives_rule_replacement() {
        let contexts = MetaDataContexts::new();
        let rules = || {
            RuleMetaData::from_configurations(&[RuleConfiguration::ReadwriteSplitting {
                data_sources: vec![ReadwriteSplittingDataSourceConfiguration {
                    name: "rw".to_string(),
                    write_data_source_name: "primary".to_string(),
                    read_data_source_names: vec!["replica_0".to_string(), "replica_1".to_string()],
                    load_balancer: "round_robin".to_string(),
                }],
            }])
            .unwrap()
        };

        // Known before the database exists
        assert!(!contexts.set_data_source_enabled("db", "rw", "replica_0", false).await);
        let database = contexts.put_database("db", rules()).await;
        assert_eq!(
            database.rule_metadata().await.enabled_read_data_sources("rw"),
            Some(vec!["replica_1".to_string()])
        );

        contexts.put_database("db", rules()).await;
        assert_eq!(
            database.rule_metadata().await.enabled_read_data_sources("rw"),
            Some(vec!["replica_1".to_string()])
        );

        assert!(contexts.set_data_source_enabled("db", "rw", "replica_0", true).await);
        assert_eq!(
            database
                .rule_metadata()
                .await
                .enabled_read_data_sources("rw")
                .map(|r| r.len()),
            Some(2)
        );
    }
}
