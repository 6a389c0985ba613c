//! Rules that pin whole tables: broadcast and single

use std::collections::{BTreeSet, HashMap};

use super::config::DataNode;
use super::DataNodeRuleAttribute;
use crate::metadata::error::MetadataResult;

/// Tables replicated in full to every data source
#[derive(Debug, Clone)]
pub struct BroadcastRule {
    tables: Vec<String>,
    data_sources: Vec<String>,
}

impl BroadcastRule {
    pub fn new(tables: Vec<String>, data_sources: Vec<String>) -> Self {
        Self {
            tables,
            data_sources,
        }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn is_broadcast_table(&self, table: &str) -> bool {
        self.tables.iter().any(|t| t.eq_ignore_ascii_case(table))
    }
}

impl DataNodeRuleAttribute for BroadcastRule {
    // Every replica applies the same change, one count is authoritative
    fn is_need_accumulate(&self, _tables: &[String]) -> bool {
        false
    }

    fn data_sources_of(&self, logic_table: &str) -> Vec<String> {
        if self.is_broadcast_table(logic_table) {
            self.data_sources.clone()
        } else {
            Vec::new()
        }
    }
}

/// Tables that live on exactly one data source
#[derive(Debug, Clone)]
pub struct SingleRule {
    configuration: Vec<String>,
    tables: HashMap<String, DataNode>,
}

impl SingleRule {
    pub fn new(configuration: Vec<String>) -> MetadataResult<Self> {
        let mut tables = HashMap::with_capacity(configuration.len());
        for raw in &configuration {
            let node = DataNode::parse(raw)?;
            tables.insert(node.table_name.to_lowercase(), node);
        }
        Ok(Self {
            configuration,
            tables,
        })
    }

    pub fn configuration(&self) -> &[String] {
        &self.configuration
    }

    /// All data sources any single table lives on
    pub fn data_sources(&self) -> BTreeSet<String> {
        self.tables
            .values()
            .map(|node| node.data_source_name.clone())
            .collect()
    }
}

impl DataNodeRuleAttribute for SingleRule {
    fn is_need_accumulate(&self, _tables: &[String]) -> bool {
        false
    }

    fn data_sources_of(&self, logic_table: &str) -> Vec<String> {
        self.tables
            .get(&logic_table.to_lowercase())
            .map(|node| vec![node.data_source_name.clone()])
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_rule_locates_table() {
        let rule = SingleRule::new(vec!["ds_1.t_user".to_string()]).unwrap();
        assert_eq!(rule.data_sources_of("T_USER"), vec!["ds_1".to_string()]);
        assert!(rule.data_sources_of("t_order").is_empty());
        assert!(!rule.is_need_accumulate(&["t_user".to_string()]));
    }

    #[test]
    fn test_broadcast_rule_covers_all_sources() {
        let rule = BroadcastRule::new(
            vec!["t_dict".to_string()],
            vec!["ds_0".to_string(), "ds_1".to_string()],
        );
        assert_eq!(rule.data_sources_of("t_dict").len(), 2);
        assert!(!rule.is_need_accumulate(&["t_dict".to_string()]));
    }
}
