use super::ShardError;

/// Extension trait for convenient error conversion
pub trait ErrorExt<T> {
    /// Convert to ShardError with context
    fn to_shard_error(self, context: impl Into<String>) -> Result<T, ShardError>;

    /// Convert to a configuration error with a specific code
    fn to_config_error(self, code: u16, message: impl Into<String>) -> Result<T, ShardError>;
}

impl<T, E> ErrorExt<T> for Result<T, E>
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    fn to_shard_error(self, context: impl Into<String>) -> Result<T, ShardError> {
        self.map_err(|e| ShardError::other(context).with_source(e))
    }

    fn to_config_error(self, code: u16, message: impl Into<String>) -> Result<T, ShardError> {
        self.map_err(|e| ShardError::config_with_code(code, message).with_source(e))
    }
}
