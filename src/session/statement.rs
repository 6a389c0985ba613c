//! Bound statement context handed over by the parser/binder

use serde::{Deserialize, Serialize};

/// Kind of a bound SQL statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    CreateTable,
    AlterTable,
    DropTable,
    Other,
}

impl StatementKind {
    /// Check if the statement changes table structure
    pub fn is_ddl(&self) -> bool {
        matches!(
            self,
            StatementKind::CreateTable | StatementKind::AlterTable | StatementKind::DropTable
        )
    }

    /// Check if the statement changes rows
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }
}

/// Column of a created or altered table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    pub data_type: String,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default)]
    pub generated: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            primary_key: false,
            generated: false,
        }
    }

    /// Mark as primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as generated (auto increment) column
    pub fn generated(mut self) -> Self {
        self.generated = true;
        self
    }
}

/// Statement after parsing and binding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlStatementContext {
    pub kind: StatementKind,
    /// Logical table names referenced by the statement
    pub tables: Vec<String>,
    /// Database named explicitly in the statement, e.g. `orders_db.t_order`
    #[serde(default)]
    pub database: Option<String>,
    /// Columns defined by CREATE TABLE or added by ALTER TABLE
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
    /// Columns removed by ALTER TABLE
    #[serde(default)]
    pub dropped_columns: Vec<String>,
    /// Key generated for an INSERT
    #[serde(default)]
    pub generated_key: Option<i64>,
}

impl SqlStatementContext {
    pub fn new(kind: StatementKind, tables: Vec<String>) -> Self {
        Self {
            kind,
            tables,
            database: None,
            columns: Vec::new(),
            dropped_columns: Vec::new(),
            generated_key: None,
        }
    }

    pub fn select(tables: &[&str]) -> Self {
        Self::new(StatementKind::Select, to_owned(tables))
    }

    pub fn insert(table: &str) -> Self {
        Self::new(StatementKind::Insert, vec![table.to_string()])
    }

    pub fn update(tables: &[&str]) -> Self {
        Self::new(StatementKind::Update, to_owned(tables))
    }

    pub fn delete(tables: &[&str]) -> Self {
        Self::new(StatementKind::Delete, to_owned(tables))
    }

    pub fn create_table(table: &str, columns: Vec<ColumnDefinition>) -> Self {
        Self::new(StatementKind::CreateTable, vec![table.to_string()]).with_columns(columns)
    }

    pub fn alter_table(table: &str) -> Self {
        Self::new(StatementKind::AlterTable, vec![table.to_string()])
    }

    pub fn drop_table(tables: &[&str]) -> Self {
        Self::new(StatementKind::DropTable, to_owned(tables))
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_columns(mut self, columns: Vec<ColumnDefinition>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_dropped_columns(mut self, columns: &[&str]) -> Self {
        self.dropped_columns = to_owned(columns);
        self
    }

    pub fn with_generated_key(mut self, key: i64) -> Self {
        self.generated_key = Some(key);
        self
    }

    pub fn table_names(&self) -> &[String] {
        &self.tables
    }
}

fn to_owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert!(StatementKind::AlterTable.is_ddl());
        assert!(!StatementKind::AlterTable.is_dml());
        assert!(StatementKind::Delete.is_dml());
        assert!(!StatementKind::Select.is_dml());
        assert!(!StatementKind::Other.is_ddl());
    }

    #[test]
    fn test_builders() {
        let statement = SqlStatementContext::alter_table("t_order")
            .with_database("sharding_db")
            .with_columns(vec![ColumnDefinition::new("status", "varchar")])
            .with_dropped_columns(&["legacy"]);

        assert_eq!(statement.kind, StatementKind::AlterTable);
        assert_eq!(statement.table_names(), ["t_order".to_string()]);
        assert_eq!(statement.database.as_deref(), Some("sharding_db"));
        assert_eq!(statement.dropped_columns, vec!["legacy".to_string()]);
    }
}
