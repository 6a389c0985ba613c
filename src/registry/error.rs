//! Error types for the registry client layer

use crate::error::{ErrorCode, ShardError};
use std::fmt;
use thiserror::Error;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Registry error types
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Serialization/deserialization of a registry value failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend operation failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Lock operation failed
    #[error("Lock error: {0}")]
    Lock(String),

    /// Key not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Key or lock already held by someone else
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Registry backend unreachable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Timeout occurred
    #[error("Timeout: operation took longer than {0:?}")]
    Timeout(std::time::Duration),

    /// Generic error wrapper
    #[error("Registry error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RegistryError {
    /// Create a serialization error
    pub fn serialization<E: fmt::Display>(err: E) -> Self {
        Self::Serialization(err.to_string())
    }

    /// Create a backend error
    pub fn backend<E: fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }

    /// Create a lock error
    pub fn lock<E: fmt::Display>(err: E) -> Self {
        Self::Lock(err.to_string())
    }

    /// Create a not found error
    pub fn not_found<E: fmt::Display>(item: E) -> Self {
        Self::NotFound(item.to_string())
    }

    /// Create a conflict error
    pub fn conflict<E: fmt::Display>(msg: E) -> Self {
        Self::Conflict(msg.to_string())
    }

    /// Create an unavailable error
    pub fn unavailable<E: fmt::Display>(msg: E) -> Self {
        Self::Unavailable(msg.to_string())
    }

    /// Create a configuration error
    pub fn configuration<E: fmt::Display>(msg: E) -> Self {
        Self::Configuration(msg.to_string())
    }

    /// Create a connection error
    pub fn connection<E: fmt::Display>(msg: E) -> Self {
        Self::Connection(msg.to_string())
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Backend(_)
                | Self::Lock(_)
                | Self::Unavailable(_)
                | Self::Connection(_)
                | Self::Timeout(_)
        )
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err)
    }
}

/// Convert RegistryError to ShardError
impl From<RegistryError> for ShardError {
    fn from(err: RegistryError) -> Self {
        let code = match &err {
            RegistryError::Serialization(_) => ErrorCode::REGISTRY_SERIALIZATION_ERROR,
            RegistryError::Backend(_) => ErrorCode::REGISTRY_BACKEND_ERROR,
            RegistryError::Lock(_) => ErrorCode::REGISTRY_LOCK_FAILED,
            RegistryError::NotFound(_) => ErrorCode::REGISTRY_NOT_FOUND,
            RegistryError::Conflict(_) => ErrorCode::REGISTRY_CONFLICT,
            RegistryError::Unavailable(_) | RegistryError::Connection(_) => {
                ErrorCode::REGISTRY_UNAVAILABLE
            }
            RegistryError::Configuration(_) => ErrorCode::REGISTRY_CONFIGURATION,
            RegistryError::Timeout(_) => ErrorCode::REGISTRY_TIMEOUT,
            RegistryError::Other(_) => ErrorCode::REGISTRY_GENERIC,
        };

        ShardError::registry_with_code(code, err.to_string(), None).with_source(err)
    }
}
