use std::collections::{BTreeSet, HashMap};

use super::config::ReadwriteSplittingDataSourceConfiguration;

/// Read-write splitting rule: one write data source and several replicas per group.
///
/// Replicas can be disabled cluster-wide; a disabled replica stays in the
/// configuration but is no longer reported as readable.
#[derive(Debug, Clone)]
pub struct ReadwriteSplittingRule {
    configuration: Vec<ReadwriteSplittingDataSourceConfiguration>,
    disabled: HashMap<String, BTreeSet<String>>,
}

impl ReadwriteSplittingRule {
    pub fn new(configuration: Vec<ReadwriteSplittingDataSourceConfiguration>) -> Self {
        Self {
            configuration,
            disabled: HashMap::new(),
        }
    }

    pub fn configuration(&self) -> &[ReadwriteSplittingDataSourceConfiguration] {
        &self.configuration
    }

    fn group(&self, name: &str) -> Option<&ReadwriteSplittingDataSourceConfiguration> {
        self.configuration.iter().find(|ds| ds.name == name)
    }

    /// Enable or disable a replica of `group`; false if the group has no such replica
    pub fn set_data_source_enabled(&mut self, group: &str, data_source: &str, enabled: bool) -> bool {
        let known = self
            .group(group)
            .is_some_and(|g| g.read_data_source_names.iter().any(|ds| ds == data_source));
        if !known {
            return false;
        }

        if enabled {
            if let Some(disabled) = self.disabled.get_mut(group) {
                disabled.remove(data_source);
            }
        } else {
            self.disabled
                .entry(group.to_string())
                .or_default()
                .insert(data_source.to_string());
        }
        true
    }

    pub fn is_data_source_enabled(&self, group: &str, data_source: &str) -> bool {
        !self
            .disabled
            .get(group)
            .is_some_and(|disabled| disabled.contains(data_source))
    }

    /// Replicas of `group` currently readable, in configuration order
    pub fn enabled_read_data_sources(&self, group: &str) -> Option<Vec<&str>> {
        let group_config = self.group(group)?;
        Some(
            group_config
                .read_data_source_names
                .iter()
                .filter(|ds| self.is_data_source_enabled(group, ds))
                .map(String::as_str)
                .collect(),
        )
    }
}
