use serde::{Deserialize, Serialize};

use crate::session::ColumnDefinition;

/// Cached structure of one logical table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetaData {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    /// Physical data sources the table was created on
    pub data_sources: Vec<String>,
    /// Bumped on every structural change; peers only apply newer versions
    pub version: u64,
    /// Next value the generated key column hands out
    pub auto_increment: i64,
}

impl TableMetaData {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDefinition>, data_sources: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            data_sources,
            version: 1,
            auto_increment: 1,
        }
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Add or replace columns and drop others, bumping the version
    pub fn alter(&mut self, added: &[ColumnDefinition], dropped: &[String]) {
        self.columns
            .retain(|c| !dropped.iter().any(|d| d.eq_ignore_ascii_case(&c.name)));
        for column in added {
            match self
                .columns
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(&column.name))
            {
                Some(existing) => *existing = column.clone(),
                None => self.columns.push(column.clone()),
            }
        }
        self.version += 1;
    }

    /// Raise the counter past a generated key; returns whether it moved
    pub fn observe_generated_key(&mut self, key: i64) -> bool {
        let next = key.saturating_add(1);
        if next > self.auto_increment {
            self.auto_increment = next;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alter_replaces_and_drops_columns() {
        let mut table = TableMetaData::new(
            "t_order",
            vec![
                ColumnDefinition::new("order_id", "bigint").primary_key(),
                ColumnDefinition::new("status", "varchar"),
            ],
            vec!["ds_0".to_string()],
        );

        table.alter(
            &[ColumnDefinition::new("STATUS", "int"), ColumnDefinition::new("note", "text")],
            &["order_id".to_string()],
        );

        assert_eq!(table.version, 2);
        assert!(table.column("order_id").is_none());
        assert_eq!(table.column("status").map(|c| c.data_type.as_str()), Some("int"));
        assert!(table.column("note").is_some());
    }

    #[test]
    fn test_auto_increment_only_moves_forward() {
        let mut table = TableMetaData::new("t", vec![], vec![]);
        assert!(table.observe_generated_key(10));
        assert_eq!(table.auto_increment, 11);
        assert!(!table.observe_generated_key(3));
        assert_eq!(table.auto_increment, 11);
    }
}
