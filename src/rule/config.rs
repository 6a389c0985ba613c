//! Declarative rule configurations as stored in node config and the registry

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::metadata::error::{MetadataError, MetadataResult};

/// Load balancer used when no other is configured
pub const DEFAULT_LOAD_BALANCER: &str = "round_robin";

const SUPPORTED_LOAD_BALANCERS: &[&str] = &["round_robin"];

/// Rule configuration of one kind, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleConfiguration {
    Sharding {
        tables: Vec<ShardingTableConfiguration>,
    },
    ReadwriteSplitting {
        data_sources: Vec<ReadwriteSplittingDataSourceConfiguration>,
    },
    Broadcast {
        tables: Vec<String>,
    },
    /// Tables living on exactly one data source, given as `ds.table`
    Single {
        tables: Vec<String>,
    },
}

/// A logical table and the physical `ds.table` nodes it is split over
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardingTableConfiguration {
    pub logic_table: String,
    pub actual_data_nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadwriteSplittingDataSourceConfiguration {
    pub name: String,
    pub write_data_source_name: String,
    pub read_data_source_names: Vec<String>,
    #[serde(default = "default_load_balancer")]
    pub load_balancer: String,
}

fn default_load_balancer() -> String {
    DEFAULT_LOAD_BALANCER.to_string()
}

/// Physical location of a table: data source plus actual table name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataNode {
    pub data_source_name: String,
    pub table_name: String,
}

impl DataNode {
    /// Parse a `ds.table` node
    pub fn parse(node: &str) -> MetadataResult<Self> {
        match node.trim().split_once('.') {
            Some((ds, table)) if !ds.is_empty() && !table.is_empty() && !table.contains('.') => {
                Ok(Self {
                    data_source_name: ds.to_string(),
                    table_name: table.to_string(),
                })
            }
            _ => Err(MetadataError::invalid_rule(format!(
                "invalid data node '{}', expected 'data_source.table'",
                node
            ))),
        }
    }
}

impl RuleConfiguration {
    /// Short name of the rule kind
    pub fn kind(&self) -> &'static str {
        match self {
            RuleConfiguration::Sharding { .. } => "sharding",
            RuleConfiguration::ReadwriteSplitting { .. } => "readwrite_splitting",
            RuleConfiguration::Broadcast { .. } => "broadcast",
            RuleConfiguration::Single { .. } => "single",
        }
    }

    /// Check the configuration is internally consistent
    pub fn validate(&self) -> MetadataResult<()> {
        match self {
            RuleConfiguration::Sharding { tables } => validate_sharding(tables),
            RuleConfiguration::ReadwriteSplitting { data_sources } => {
                validate_readwrite_splitting(data_sources)
            }
            RuleConfiguration::Broadcast { tables } => {
                check_unique(tables.iter().map(|t| t.to_lowercase()), "broadcast table")
            }
            RuleConfiguration::Single { tables } => {
                for table in tables {
                    DataNode::parse(table)?;
                }
                Ok(())
            }
        }
    }
}

fn validate_sharding(tables: &[ShardingTableConfiguration]) -> MetadataResult<()> {
    check_unique(
        tables.iter().map(|t| t.logic_table.to_lowercase()),
        "sharding table",
    )?;

    for table in tables {
        if table.logic_table.trim().is_empty() {
            return Err(MetadataError::invalid_rule("sharding logic table is empty"));
        }
        if table.actual_data_nodes.is_empty() {
            return Err(MetadataError::invalid_rule(format!(
                "sharding table '{}' has no actual data nodes",
                table.logic_table
            )));
        }
        for node in &table.actual_data_nodes {
            DataNode::parse(node)?;
        }
    }
    Ok(())
}

fn validate_readwrite_splitting(
    data_sources: &[ReadwriteSplittingDataSourceConfiguration],
) -> MetadataResult<()> {
    check_unique(
        data_sources.iter().map(|ds| ds.name.clone()),
        "readwrite-splitting rule",
    )?;
    check_unique(
        data_sources.iter().map(|ds| ds.write_data_source_name.clone()),
        "write data source",
    )?;

    for ds in data_sources {
        if ds.name.trim().is_empty() || ds.write_data_source_name.trim().is_empty() {
            return Err(MetadataError::invalid_rule(
                "readwrite-splitting rule needs a name and a write data source",
            ));
        }
        if ds.read_data_source_names.is_empty() {
            return Err(MetadataError::invalid_rule(format!(
                "readwrite-splitting rule '{}' has no read data sources",
                ds.name
            )));
        }
        if !SUPPORTED_LOAD_BALANCERS.contains(&ds.load_balancer.as_str()) {
            return Err(MetadataError::invalid_rule(format!(
                "unsupported load balancer '{}' in rule '{}'",
                ds.load_balancer, ds.name
            )));
        }
    }
    Ok(())
}

fn check_unique(names: impl Iterator<Item = String>, what: &str) -> MetadataResult<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name.clone()) {
            return Err(MetadataError::invalid_rule(format!(
                "duplicate {} '{}'",
                what, name
            )));
        }
    }
    Ok(())
}
