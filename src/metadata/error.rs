//! Error types for cached metadata and rules

use crate::error::{ErrorCode, ShardError};
use crate::registry::RegistryError;
use thiserror::Error;

pub type MetadataResult<T> = Result<T, MetadataError>;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Table {table} not found in database {database}")]
    TableNotFound { database: String, table: String },

    #[error("Database {0} not found")]
    DatabaseNotFound(String),

    #[error("Invalid rule configuration: {0}")]
    InvalidRule(String),

    #[error("Failed to persist metadata of database {database}")]
    Persist {
        database: String,
        #[source]
        source: RegistryError,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MetadataError {
    pub fn invalid_rule(msg: impl Into<String>) -> Self {
        Self::InvalidRule(msg.into())
    }

    pub fn table_not_found(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self::TableNotFound {
            database: database.into(),
            table: table.into(),
        }
    }

    pub fn persist(database: impl Into<String>, source: RegistryError) -> Self {
        Self::Persist {
            database: database.into(),
            source,
        }
    }
}

impl From<MetadataError> for ShardError {
    fn from(err: MetadataError) -> Self {
        let (code, database) = match &err {
            MetadataError::TableNotFound { database, .. } => {
                (ErrorCode::METADATA_TABLE_NOT_FOUND, Some(database.clone()))
            }
            MetadataError::DatabaseNotFound(database) => {
                (ErrorCode::METADATA_DATABASE_NOT_FOUND, Some(database.clone()))
            }
            MetadataError::InvalidRule(_) => (ErrorCode::METADATA_INVALID_RULE, None),
            MetadataError::Persist { database, .. } => {
                (ErrorCode::METADATA_PERSIST_FAILED, Some(database.clone()))
            }
            MetadataError::Serialization(_) => (ErrorCode::METADATA_GENERIC, None),
        };

        ShardError::metadata_with_code(code, err.to_string(), database).with_source(err)
    }
}
