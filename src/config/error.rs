use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::error::{ErrorCode, ShardError};

pub type ConfigResult<T> = Result<T, ConfigError>;

/// A single rejected configuration value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub path: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported configuration format '{0}' (expected toml, yaml, yml or json)")]
    UnsupportedFormat(String),

    #[error("Failed to parse {format} configuration: {message}")]
    Parse { format: &'static str, message: String },

    /// Every invalid value, not just the first
    #[error("Invalid configuration: {}", join_issues(.0))]
    Invalid(Vec<ConfigIssue>),
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ConfigError {
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            ConfigError::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

impl From<ConfigError> for ShardError {
    fn from(err: ConfigError) -> Self {
        let code = match &err {
            ConfigError::NotFound(_) => ErrorCode::CONFIG_NOT_FOUND,
            ConfigError::Io { .. } => ErrorCode::CONFIG_GENERIC,
            ConfigError::UnsupportedFormat(_) => ErrorCode::CONFIG_UNSUPPORTED_FORMAT,
            ConfigError::Parse { .. } => ErrorCode::CONFIG_PARSE_ERROR,
            ConfigError::Invalid(_) => ErrorCode::CONFIG_INVALID_VALUE,
        };
        ShardError::config_with_code(code, err.to_string()).with_source(err)
    }
}
