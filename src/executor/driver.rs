//! Statement-level entry points of the execution engine

use std::sync::Arc;
use tracing::debug;

use super::callback::{ExecutorCallback, QueryResult};
use super::engine::ExecutorEngine;
use super::error::{ExecutionError, ExecutionResult};
use super::process::ProcessRegistry;
use super::unit::ExecutionGroupContext;
use crate::metadata::{Database, MetaDataContexts, MetaDataRefreshEngine};
use crate::session::{QueryContext, RouteUnit};

/// Executes routed statements and reconciles their per-unit results
pub struct DriverExecutor {
    metadata: Arc<MetaDataContexts>,
    processes: ProcessRegistry,
    engine: ExecutorEngine,
    refresh: Arc<MetaDataRefreshEngine>,
}

impl DriverExecutor {
    pub fn new(
        metadata: Arc<MetaDataContexts>,
        processes: ProcessRegistry,
        engine: ExecutorEngine,
        refresh: Arc<MetaDataRefreshEngine>,
    ) -> Self {
        Self {
            metadata,
            processes,
            engine,
            refresh,
        }
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    /// Run a query on every unit; one result per unit in submission order
    pub async fn execute_query(
        &self,
        group_context: &ExecutionGroupContext,
        query_context: &QueryContext,
        callback: Arc<dyn ExecutorCallback<QueryResult>>,
    ) -> ExecutionResult<Vec<QueryResult>> {
        let guard = self.processes.begin(group_context, query_context);
        self.engine
            .execute(group_context, guard.process(), callback)
            .await
    }

    /// Run an update on every unit and reconcile the affected row counts.
    ///
    /// Counts are summed (null as 0) when any active rule of the target
    /// database fragments one of the statement's tables; otherwise the first
    /// unit's count is returned as is.
    pub async fn execute_update(
        &self,
        group_context: &ExecutionGroupContext,
        query_context: &QueryContext,
        route_units: &[RouteUnit],
        callback: Arc<dyn ExecutorCallback<Option<i64>>>,
    ) -> ExecutionResult<i64> {
        let database = self.target_database(query_context).await?;
        let guard = self.processes.begin(group_context, query_context);

        let results = self
            .engine
            .execute(group_context, guard.process(), callback)
            .await?;

        let rules = database.rule_metadata().await;
        let affected = if rules.need_accumulate(query_context.statement.table_names()) {
            accumulate(&results)
        } else {
            results.first().copied().flatten().unwrap_or(0)
        };
        debug!(
            "Process {} updated {} rows over {} units",
            group_context.process_id(),
            affected,
            results.len()
        );

        self.refresh
            .refresh(&database, &query_context.statement, route_units)
            .await?;
        drop(guard);
        Ok(affected)
    }

    /// Run a statement of unknown kind; true when the first unit produced a result set
    pub async fn execute(
        &self,
        group_context: &ExecutionGroupContext,
        query_context: &QueryContext,
        route_units: &[RouteUnit],
        callback: Arc<dyn ExecutorCallback<Option<bool>>>,
    ) -> ExecutionResult<bool> {
        let database = self.target_database(query_context).await?;
        let guard = self.processes.begin(group_context, query_context);

        let results = self
            .engine
            .execute(group_context, guard.process(), callback)
            .await?;
        let produced_result_set = results.first().copied().flatten().unwrap_or(false);

        self.refresh
            .refresh(&database, &query_context.statement, route_units)
            .await?;
        drop(guard);
        Ok(produced_result_set)
    }

    async fn target_database(&self, query_context: &QueryContext) -> ExecutionResult<Arc<Database>> {
        let name = query_context.target_database();
        self.metadata
            .database(name)
            .await
            .ok_or_else(|| ExecutionError::UnknownDatabase(name.to_string()))
    }
}

fn accumulate(results: &[Option<i64>]) -> i64 {
    results
        .iter()
        .map(|count| count.unwrap_or(0))
        .fold(0i64, i64::saturating_add)
}
