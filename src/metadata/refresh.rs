//! Post-execution refresh of cached metadata

use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::database::Database;
use super::error::{MetadataError, MetadataResult};
use super::persist::MetaDataPersistService;
use super::table::TableMetaData;
use crate::session::{RouteUnit, SqlStatementContext, StatementKind};

/// Applies DDL and DML side effects of an executed statement to cached metadata.
///
/// Every change is written through the persist service before the local cache
/// is touched, so a failed write leaves the cache as it was. Changes to one
/// table are serialised; different tables refresh concurrently.
pub struct MetaDataRefreshEngine {
    persist: Arc<dyn MetaDataPersistService>,
    table_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

impl MetaDataRefreshEngine {
    pub fn new(persist: Arc<dyn MetaDataPersistService>) -> Self {
        Self {
            persist,
            table_locks: DashMap::new(),
        }
    }

    fn table_lock(&self, database: &str, table: &str) -> Arc<Mutex<()>> {
        self.table_locks
            .entry((database.to_string(), table.to_lowercase()))
            .or_default()
            .clone()
    }

    pub async fn refresh(
        &self,
        database: &Database,
        statement: &SqlStatementContext,
        route_units: &[RouteUnit],
    ) -> MetadataResult<()> {
        match statement.kind {
            StatementKind::CreateTable => self.create_table(database, statement, route_units).await,
            StatementKind::AlterTable => self.alter_table(database, statement).await,
            StatementKind::DropTable => self.drop_tables(database, statement).await,
            StatementKind::Insert => match statement.generated_key {
                Some(key) => self.observe_generated_key(database, statement, key).await,
                None => Ok(()),
            },
            _ => Ok(()),
        }
    }

    async fn create_table(
        &self,
        database: &Database,
        statement: &SqlStatementContext,
        route_units: &[RouteUnit],
    ) -> MetadataResult<()> {
        let Some(name) = statement.tables.first() else {
            return Ok(());
        };
        let lock = self.table_lock(database.name(), name);
        let _guard = lock.lock().await;

        let mut data_sources: Vec<String> = route_units
            .iter()
            .map(|unit| unit.actual_data_source().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if data_sources.is_empty() {
            data_sources = database.rule_metadata().await.data_sources_of(name);
        }

        let mut table = TableMetaData::new(name.clone(), statement.columns.clone(), data_sources);
        if let Some(existing) = database.table(name).await {
            table.version = existing.version + 1;
            table.auto_increment = existing.auto_increment;
        }

        self.persist.persist_table(database.name(), &table).await?;
        info!(
            "Created table {}.{} on {:?}",
            database.name(),
            table.name,
            table.data_sources
        );
        database.put_table(table).await;
        Ok(())
    }

    async fn alter_table(
        &self,
        database: &Database,
        statement: &SqlStatementContext,
    ) -> MetadataResult<()> {
        let Some(name) = statement.tables.first() else {
            return Ok(());
        };
        let lock = self.table_lock(database.name(), name);
        let _guard = lock.lock().await;

        let mut table = database
            .table(name)
            .await
            .ok_or_else(|| MetadataError::table_not_found(database.name(), name.clone()))?;
        table.alter(&statement.columns, &statement.dropped_columns);

        self.persist.persist_table(database.name(), &table).await?;
        debug!(
            "Altered table {}.{} to version {}",
            database.name(),
            table.name,
            table.version
        );
        database.put_table(table).await;
        Ok(())
    }

    async fn drop_tables(
        &self,
        database: &Database,
        statement: &SqlStatementContext,
    ) -> MetadataResult<()> {
        for name in &statement.tables {
            let lock = self.table_lock(database.name(), name);
            let dropped = {
                let _guard = lock.lock().await;
                self.persist.drop_table(database.name(), name).await
            };
            drop(lock);
            self.forget_table_lock(database.name(), name);
            dropped?;

            if database.remove_table(name).await.is_some() {
                info!("Dropped table {}.{}", database.name(), name);
            }
        }
        Ok(())
    }

    /// Drop the lock entry of a table unless another refresh still holds it
    fn forget_table_lock(&self, database: &str, table: &str) {
        self.table_locks
            .remove_if(&(database.to_string(), table.to_lowercase()), |_, lock| {
                Arc::strong_count(lock) == 1
            });
    }

    async fn observe_generated_key(
        &self,
        database: &Database,
        statement: &SqlStatementContext,
        key: i64,
    ) -> MetadataResult<()> {
        let Some(name) = statement.tables.first() else {
            return Ok(());
        };
        let lock = self.table_lock(database.name(), name);
        let _guard = lock.lock().await;

        // Tables created outside this cluster are not cached
        let Some(mut table) = database.table(name).await else {
            return Ok(());
        };
        if table.observe_generated_key(key) {
            self.persist.persist_table(database.name(), &table).await?;
            database.put_table(table).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::persist::NoopMetaDataPersistService;
    use crate::rule::RuleMetaData;
    use crate::session::{ColumnDefinition, RouteMapper};

    fn route(ds: &str, table: &str) -> RouteUnit {
        RouteUnit::new(
            RouteMapper::new("logic_db", ds),
            vec![RouteMapper::new(table, table)],
        )
    }

    fn engine() -> MetaDataRefreshEngine {
        MetaDataRefreshEngine::new(Arc::new(NoopMetaDataPersistService::new()))
    }

    #[tokio::test]
    async fn test_create_alter_drop() {
        let engine = engine();
        let database = Database::new("db", RuleMetaData::default());

        let create = SqlStatementContext::create_table(
            "t_order",
            vec![ColumnDefinition::new("order_id", "bigint").generated()],
        );
        engine
            .refresh(&database, &create, &[route("ds_1", "t_order"), route("ds_0", "t_order")])
            .await
            .unwrap();

        let table = database.table("t_order").await.unwrap();
        assert_eq!(table.version, 1);
        assert_eq!(table.data_sources, vec!["ds_0".to_string(), "ds_1".to_string()]);

        let alter = SqlStatementContext::alter_table("t_order")
            .with_columns(vec![ColumnDefinition::new("status", "varchar")]);
        engine.refresh(&database, &alter, &[]).await.unwrap();
        let table = database.table("t_order").await.unwrap();
        assert_eq!(table.version, 2);
        assert!(table.column("status").is_some());

        engine
            .refresh(&database, &SqlStatementContext::drop_table(&["t_order"]), &[])
            .await
            .unwrap();
        assert!(database.table("t_order").await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_tables_release_their_locks() {
        let engine = engine();
        let database = Database::new("db", RuleMetaData::default());

        for i in 0..3 {
            let name = format!("t_tmp_{}", i);
            let create = SqlStatementContext::create_table(
                &name,
                vec![ColumnDefinition::new("id", "bigint")],
            );
            engine
                .refresh(&database, &create, &[route("ds_0", &name)])
                .await
                .unwrap();
        }
        assert_eq!(engine.table_locks.len(), 3);

        // A lock still shared with a waiting refresh survives the drop
        let held = engine.table_lock("db", "t_tmp_2");
        let drop_all = SqlStatementContext::drop_table(&["t_tmp_0", "T_TMP_1", "t_tmp_2"]);
        engine.refresh(&database, &drop_all, &[]).await.unwrap();
        assert_eq!(engine.table_locks.len(), 1);

        drop(held);
        engine
            .refresh(&database, &SqlStatementContext::drop_table(&["t_tmp_2"]), &[])
            .await
            .unwrap();
        assert!(engine.table_locks.is_empty());
        assert!(database.tables().await.is_empty());
    }

    #[tokio::test]
    async fn test_alter_unknown_table_fails() {
        let database = Database::new("db", RuleMetaData::default());
        let err = engine()
            .refresh(&database, &SqlStatementContext::alter_table("t_missing"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, MetadataError::TableNotFound { .. }));
    }

    #[tokio::test]
    async fn test_insert_raises_auto_increment() {
        let engine = engine();
        let database = Database::new("db", RuleMetaData::default());
        database
            .put_table(TableMetaData::new("t_order", vec![], vec![]))
            .await;

        let insert = SqlStatementContext::insert("t_order").with_generated_key(41);
        engine.refresh(&database, &insert, &[]).await.unwrap();
        assert_eq!(database.table("t_order").await.unwrap().auto_increment, 42);

        let select = SqlStatementContext::select(&["t_order"]);
        engine.refresh(&database, &select, &[]).await.unwrap();
        assert_eq!(database.table("t_order").await.unwrap().version, 1);
    }
}
