//! Execution units and their grouping by physical connection

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlUnit {
    pub sql: String,
    #[serde(default)]
    pub parameters: Vec<serde_json::Value>,
}

/// One physical-data-source-targeted statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionUnit {
    pub data_source: String,
    pub sql_unit: SqlUnit,
}

impl ExecutionUnit {
    pub fn new(data_source: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            sql_unit: SqlUnit {
                sql: sql.into(),
                parameters: Vec::new(),
            },
        }
    }

    pub fn with_parameters(mut self, parameters: Vec<serde_json::Value>) -> Self {
        self.sql_unit.parameters = parameters;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql_unit.sql
    }
}

/// Units sharing one physical connection; they run strictly in order
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionGroup {
    pub data_source: String,
    /// Which of the data source's connections this group holds
    pub connection_offset: usize,
    pub units: Vec<ExecutionUnit>,
}

impl ExecutionGroup {
    pub fn new(data_source: impl Into<String>, connection_offset: usize, units: Vec<ExecutionUnit>) -> Self {
        Self {
            data_source: data_source.into(),
            connection_offset,
            units,
        }
    }

    /// Split units into groups, using at most `max_connections_per_source`
    /// connections per data source.
    ///
    /// Data sources keep the order in which they first appear and each
    /// connection takes a contiguous run of that source's units.
    pub fn partition(units: Vec<ExecutionUnit>, max_connections_per_source: usize) -> Vec<Self> {
        let max_connections = max_connections_per_source.max(1);

        let mut by_source: Vec<(String, Vec<ExecutionUnit>)> = Vec::new();
        for unit in units {
            match by_source.iter_mut().find(|(ds, _)| *ds == unit.data_source) {
                Some((_, bucket)) => bucket.push(unit),
                None => by_source.push((unit.data_source.clone(), vec![unit])),
            }
        }

        let mut groups = Vec::new();
        for (data_source, bucket) in by_source {
            let per_connection = bucket.len().div_ceil(max_connections);
            let mut units = bucket.into_iter().peekable();
            let mut offset = 0;
            while units.peek().is_some() {
                let chunk: Vec<_> = units.by_ref().take(per_connection).collect();
                groups.push(Self::new(data_source.clone(), offset, chunk));
                offset += 1;
            }
        }
        groups
    }
}

/// Identifies the process an execution reports to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportContext {
    pub process_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionGroupContext {
    pub groups: Vec<ExecutionGroup>,
    pub report_context: ReportContext,
}

impl ExecutionGroupContext {
    pub fn new(groups: Vec<ExecutionGroup>, process_id: impl Into<String>) -> Self {
        Self {
            groups,
            report_context: ReportContext {
                process_id: process_id.into(),
            },
        }
    }

    /// Context with a freshly generated process id
    pub fn with_generated_id(groups: Vec<ExecutionGroup>) -> Self {
        Self::new(groups, Uuid::new_v4().to_string())
    }

    pub fn process_id(&self) -> &str {
        &self.report_context.process_id
    }

    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(|g| g.units.len()).sum()
    }

    /// Units in result order
    pub fn units(&self) -> impl Iterator<Item = &ExecutionUnit> {
        self.groups.iter().flat_map(|g| g.units.iter())
    }
}
