use serde::{Deserialize, Serialize};

use super::statement::SqlStatementContext;

/// Bound statement plus the session it runs in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryContext {
    pub statement: SqlStatementContext,
    pub sql: String,
    #[serde(default)]
    pub parameters: Vec<serde_json::Value>,
    /// Database selected by the session
    pub current_database: String,
}

impl QueryContext {
    pub fn new(
        statement: SqlStatementContext,
        sql: impl Into<String>,
        current_database: impl Into<String>,
    ) -> Self {
        Self {
            statement,
            sql: sql.into(),
            parameters: Vec::new(),
            current_database: current_database.into(),
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<serde_json::Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Database named explicitly by the statement, if any
    pub fn database_name_from_statement(&self) -> Option<&str> {
        self.statement
            .database
            .as_deref()
            .filter(|name| !name.is_empty())
    }

    /// Database the statement targets: the explicit one, else the session's
    pub fn target_database(&self) -> &str {
        self.database_name_from_statement()
            .unwrap_or(&self.current_database)
    }
}
