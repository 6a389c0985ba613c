use std::collections::{BTreeSet, HashMap};

use super::config::{DataNode, ShardingTableConfiguration};
use super::DataNodeRuleAttribute;
use crate::metadata::error::MetadataResult;

/// Sharding rule: logical tables fragmented over physical data nodes
#[derive(Debug, Clone)]
pub struct ShardingRule {
    configuration: Vec<ShardingTableConfiguration>,
    /// Keyed by lower-case logic table name
    tables: HashMap<String, Vec<DataNode>>,
}

impl ShardingRule {
    pub fn new(configuration: Vec<ShardingTableConfiguration>) -> MetadataResult<Self> {
        let mut tables = HashMap::with_capacity(configuration.len());
        for table in &configuration {
            let nodes = table
                .actual_data_nodes
                .iter()
                .map(|node| DataNode::parse(node))
                .collect::<MetadataResult<Vec<_>>>()?;
            tables.insert(table.logic_table.to_lowercase(), nodes);
        }
        Ok(Self {
            configuration,
            tables,
        })
    }

    pub fn configuration(&self) -> &[ShardingTableConfiguration] {
        &self.configuration
    }

    pub fn find_data_nodes(&self, logic_table: &str) -> Option<&[DataNode]> {
        self.tables
            .get(&logic_table.to_lowercase())
            .map(Vec::as_slice)
    }
}

impl DataNodeRuleAttribute for ShardingRule {
    fn is_need_accumulate(&self, tables: &[String]) -> bool {
        tables.iter().any(|table| {
            self.find_data_nodes(table)
                .is_some_and(|nodes| nodes.len() > 1)
        })
    }

    fn data_sources_of(&self, logic_table: &str) -> Vec<String> {
        self.find_data_nodes(logic_table)
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|n| n.data_source_name.clone())
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }
}
