use std::fmt::Display;
use thiserror::Error;

pub mod codes;
pub mod helpers;

pub use codes::{describe_error_code, ErrorCode};
pub use helpers::ErrorExt;

/// The unified error type for the whole crate
#[derive(Error, Debug)]
pub enum ShardError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Registry error: {message}")]
    Registry {
        code: u16,
        message: String,
        key: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Execution error: {message}")]
    Execution {
        code: u16,
        message: String,
        process_id: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Metadata error: {message}")]
    Metadata {
        code: u16,
        message: String,
        database: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Cluster error: {message}")]
    Cluster {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] {message}")]
    Other {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ShardError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a registry error with specific code and key
    pub fn registry_with_code(code: u16, message: impl Into<String>, key: Option<String>) -> Self {
        Self::Registry {
            code,
            message: message.into(),
            key,
            source: None,
        }
    }

    /// Create an execution error with default code
    pub fn execution(message: impl Into<String>) -> Self {
        Self::execution_with_code(ErrorCode::EXEC_GENERIC, message, None)
    }

    /// Create an execution error with specific code
    pub fn execution_with_code(
        code: u16,
        message: impl Into<String>,
        process_id: Option<String>,
    ) -> Self {
        Self::Execution {
            code,
            message: message.into(),
            process_id,
            source: None,
        }
    }

    /// Create a metadata error with specific code
    pub fn metadata_with_code(
        code: u16,
        message: impl Into<String>,
        database: Option<String>,
    ) -> Self {
        Self::Metadata {
            code,
            message: message.into(),
            database,
            source: None,
        }
    }

    /// Create a cluster error with default code
    pub fn cluster(message: impl Into<String>) -> Self {
        Self::cluster_with_code(ErrorCode::CLUSTER_GENERIC, message)
    }

    /// Create a cluster error with specific code
    pub fn cluster_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Cluster {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a generic other error
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            code: ErrorCode::OTHER_GENERIC,
            message: message.into(),
            source: None,
        }
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Registry { source: src, .. }
            | Self::Execution { source: src, .. }
            | Self::Metadata { source: src, .. }
            | Self::Cluster { source: src, .. }
            | Self::Other { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Add context to the error message
    pub fn with_context(mut self, context: impl Display) -> Self {
        match &mut self {
            Self::Config { message, .. }
            | Self::Registry { message, .. }
            | Self::Execution { message, .. }
            | Self::Metadata { message, .. }
            | Self::Cluster { message, .. }
            | Self::Other { message, .. } => {
                *message = format!("{}: {}", message, context);
            }
        }
        self
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Registry { .. } => 3,
            Self::Execution { .. } => 4,
            Self::Metadata { .. } => 5,
            Self::Cluster { .. } => 6,
            Self::Other { .. } => 1,
        }
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Registry { code, .. }
            | Self::Execution { code, .. }
            | Self::Metadata { code, .. }
            | Self::Cluster { code, .. }
            | Self::Other { code, .. } => *code,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::Registry { message, key, .. } => match key {
                Some(k) => format!("Registry error at {}: {}", k, message),
                None => format!("Registry error: {}", message),
            },
            Self::Execution {
                message,
                process_id,
                ..
            } => match process_id {
                Some(id) => format!("Statement {} failed: {}", id, message),
                None => format!("Statement failed: {}", message),
            },
            Self::Metadata {
                message, database, ..
            } => match database {
                Some(db) => format!("Metadata error in database {}: {}", db, message),
                None => format!("Metadata error: {}", message),
            },
            Self::Cluster { message, .. } => format!("Cluster error: {}", message),
            Self::Other { message, .. } => message.clone(),
        }
    }

    /// Whether the failure prevents the node from joining the cluster
    pub fn is_fatal_startup(&self) -> bool {
        matches!(self, Self::Config { .. } | Self::Cluster { .. })
    }
}

impl From<anyhow::Error> for ShardError {
    fn from(err: anyhow::Error) -> Self {
        ShardError::other(err.to_string())
    }
}
