//! Active rules of a logical database
//!
//! Rules form a closed set of variants. Capabilities are exposed through
//! accessors returning `Option`, so a rule that does not place tables on data
//! nodes simply reports `None` instead of failing a lookup.

pub mod config;
pub mod readwrite_splitting;
pub mod sharding;
pub mod table_set;

pub use config::{
    DataNode, ReadwriteSplittingDataSourceConfiguration, RuleConfiguration,
    ShardingTableConfiguration,
};
pub use readwrite_splitting::ReadwriteSplittingRule;
pub use sharding::ShardingRule;
pub use table_set::{BroadcastRule, SingleRule};

use std::collections::BTreeSet;

use crate::metadata::error::MetadataResult;

/// Capability of rules that decide where tables physically live
pub trait DataNodeRuleAttribute: Send + Sync {
    /// Whether per-data-source update counts for these tables must be summed
    fn is_need_accumulate(&self, tables: &[String]) -> bool;

    /// Data sources a logical table lives on, empty if the rule does not know it
    fn data_sources_of(&self, logic_table: &str) -> Vec<String>;
}

#[derive(Debug, Clone)]
pub enum Rule {
    Sharding(ShardingRule),
    ReadwriteSplitting(ReadwriteSplittingRule),
    Broadcast(BroadcastRule),
    Single(SingleRule),
}

impl Rule {
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Sharding(_) => "sharding",
            Rule::ReadwriteSplitting(_) => "readwrite_splitting",
            Rule::Broadcast(_) => "broadcast",
            Rule::Single(_) => "single",
        }
    }

    pub fn data_node_attribute(&self) -> Option<&dyn DataNodeRuleAttribute> {
        match self {
            Rule::Sharding(rule) => Some(rule),
            Rule::Broadcast(rule) => Some(rule),
            Rule::Single(rule) => Some(rule),
            Rule::ReadwriteSplitting(_) => None,
        }
    }

    pub fn configuration(&self) -> RuleConfiguration {
        match self {
            Rule::Sharding(rule) => RuleConfiguration::Sharding {
                tables: rule.configuration().to_vec(),
            },
            Rule::ReadwriteSplitting(rule) => RuleConfiguration::ReadwriteSplitting {
                data_sources: rule.configuration().to_vec(),
            },
            Rule::Broadcast(rule) => RuleConfiguration::Broadcast {
                tables: rule.tables().to_vec(),
            },
            Rule::Single(rule) => RuleConfiguration::Single {
                tables: rule.configuration().to_vec(),
            },
        }
    }
}

/// The rule set of one logical database
#[derive(Debug, Clone, Default)]
pub struct RuleMetaData {
    rules: Vec<Rule>,
}

impl RuleMetaData {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Validate and build rules from their configurations
    pub fn from_configurations(configurations: &[RuleConfiguration]) -> MetadataResult<Self> {
        for configuration in configurations {
            configuration.validate()?;
        }

        let data_sources = collect_data_sources(configurations);
        let mut rules = Vec::with_capacity(configurations.len());
        for configuration in configurations {
            let rule = match configuration {
                RuleConfiguration::Sharding { tables } => {
                    Rule::Sharding(ShardingRule::new(tables.clone())?)
                }
                RuleConfiguration::ReadwriteSplitting { data_sources } => {
                    Rule::ReadwriteSplitting(ReadwriteSplittingRule::new(data_sources.clone()))
                }
                RuleConfiguration::Broadcast { tables } => Rule::Broadcast(BroadcastRule::new(
                    tables.clone(),
                    data_sources.iter().cloned().collect(),
                )),
                RuleConfiguration::Single { tables } => {
                    Rule::Single(SingleRule::new(tables.clone())?)
                }
            };
            rules.push(rule);
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn configurations(&self) -> Vec<RuleConfiguration> {
        self.rules.iter().map(Rule::configuration).collect()
    }

    /// Enable or disable a read-write splitting replica; false if no rule knows it
    pub fn set_data_source_enabled(&mut self, group: &str, data_source: &str, enabled: bool) -> bool {
        let mut known = false;
        for rule in &mut self.rules {
            if let Rule::ReadwriteSplitting(rule) = rule {
                known |= rule.set_data_source_enabled(group, data_source, enabled);
            }
        }
        known
    }

    /// Readable replicas of a read-write splitting group
    pub fn enabled_read_data_sources(&self, group: &str) -> Option<Vec<String>> {
        self.rules.iter().find_map(|rule| match rule {
            Rule::ReadwriteSplitting(rule) => rule
                .enabled_read_data_sources(group)
                .map(|sources| sources.into_iter().map(str::to_string).collect()),
            _ => None,
        })
    }

    /// Whether update counts on these tables must be summed across data sources.
    ///
    /// Rules are scanned in order and the first one reporting accumulation
    /// decides; rules without the data node capability are skipped.
    pub fn need_accumulate(&self, tables: &[String]) -> bool {
        self.rules
            .iter()
            .filter_map(Rule::data_node_attribute)
            .any(|attribute| attribute.is_need_accumulate(tables))
    }

    /// Data sources a logical table lives on according to the first rule that knows it
    pub fn data_sources_of(&self, logic_table: &str) -> Vec<String> {
        self.rules
            .iter()
            .filter_map(Rule::data_node_attribute)
            .map(|attribute| attribute.data_sources_of(logic_table))
            .find(|sources| !sources.is_empty())
            .unwrap_or_default()
    }
}

fn collect_data_sources(configurations: &[RuleConfiguration]) -> BTreeSet<String> {
    let mut data_sources = BTreeSet::new();
    for configuration in configurations {
        match configuration {
            RuleConfiguration::Sharding { tables } => {
                for node in tables.iter().flat_map(|t| t.actual_data_nodes.iter()) {
                    if let Ok(node) = DataNode::parse(node) {
                        data_sources.insert(node.data_source_name);
                    }
                }
            }
            RuleConfiguration::ReadwriteSplitting { data_sources: groups } => {
                data_sources.extend(groups.iter().map(|g| g.name.clone()));
            }
            RuleConfiguration::Single { tables } => {
                for node in tables {
                    if let Ok(node) = DataNode::parse(node) {
                        data_sources.insert(node.data_source_name);
                    }
                }
            }
            RuleConfiguration::Broadcast { .. } => {}
        }
    }
    data_sources
}
