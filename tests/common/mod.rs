//! Common test utilities and helpers

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shardcore::config::NodeConfig;
use shardcore::executor::{
    DriverExecutor, ExecutionGroup, ExecutionGroupContext, ExecutionUnit, ExecutorEngine,
    ProcessRegistry,
};
use shardcore::metadata::{MetaDataContexts, MetaDataPersistService, MetaDataRefreshEngine, NoopMetaDataPersistService};
use shardcore::registry::RepositoryConfig;
use shardcore::rule::{RuleConfiguration, RuleMetaData, ShardingTableConfiguration};
use shardcore::session::{RouteMapper, RouteUnit};

pub const DATABASE: &str = "sharding_db";

/// `t_order` split over two data sources
pub fn sharding_rules() -> Vec<RuleConfiguration> {
    vec![RuleConfiguration::Sharding {
        tables: vec![ShardingTableConfiguration {
            logic_table: "t_order".to_string(),
            actual_data_nodes: vec!["ds_0.t_order_0".to_string(), "ds_1.t_order_1".to_string()],
        }],
    }]
}

/// `t_order` on a single data source
pub fn single_rules() -> Vec<RuleConfiguration> {
    vec![RuleConfiguration::Single {
        tables: vec!["ds_0.t_order".to_string()],
    }]
}

/// Everything a driver executor test needs
pub struct DriverFixture {
    pub executor: DriverExecutor,
    pub metadata: Arc<MetaDataContexts>,
    pub processes: ProcessRegistry,
}

pub async fn driver_fixture(rules: Vec<RuleConfiguration>) -> DriverFixture {
    driver_fixture_with(rules, Arc::new(NoopMetaDataPersistService::new())).await
}

pub async fn driver_fixture_with(
    rules: Vec<RuleConfiguration>,
    persist: Arc<dyn MetaDataPersistService>,
) -> DriverFixture {
    let metadata = Arc::new(MetaDataContexts::new());
    metadata
        .put_database(DATABASE, RuleMetaData::from_configurations(&rules).unwrap())
        .await;
    let processes = ProcessRegistry::new();
    let executor = DriverExecutor::new(
        metadata.clone(),
        processes.clone(),
        ExecutorEngine::new(8),
        Arc::new(MetaDataRefreshEngine::new(persist)),
    );
    DriverFixture {
        executor,
        metadata,
        processes,
    }
}

/// One group per unit, each on its own data source `ds_{i}`
pub fn spread_units(sql: &str, count: usize) -> ExecutionGroupContext {
    let units = (0..count)
        .map(|i| ExecutionUnit::new(format!("ds_{}", i), format!("{} /* {} */", sql, i)))
        .collect();
    ExecutionGroupContext::new(ExecutionGroup::partition(units, 1), uuid::Uuid::new_v4().to_string())
}

pub fn route_unit(data_source: &str, logic_table: &str, actual_table: &str) -> RouteUnit {
    RouteUnit::new(
        RouteMapper::new(data_source, data_source),
        vec![RouteMapper::new(logic_table, actual_table)],
    )
}

/// Cluster node config on a memory repository
pub fn node_config(namespace: &str, instance_id: &str) -> NodeConfig {
    let repository = RepositoryConfig::memory(namespace).with_lease_ttl(Duration::from_secs(5));
    let mut config = NodeConfig::cluster(repository);
    config.instance.id = instance_id.to_string();
    config.worker_id.allocation_timeout = Duration::from_secs(5);
    config.lock.default_timeout = Duration::from_secs(2);
    config.lock.retry_delay = Duration::from_millis(10);
    config
}

/// Poll `check` until it returns true or `timeout` elapses
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
