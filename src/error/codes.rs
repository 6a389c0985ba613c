/// Error code registry for shardcore
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 3000-3999: Registry errors
/// - 4000-4999: Execution errors
/// - 5000-5999: Metadata errors
/// - 6000-6999: Cluster errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_PARSE_ERROR: u16 = 1002;
    pub const CONFIG_UNSUPPORTED_FORMAT: u16 = 1003;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;

    // Registry errors (3000-3999)
    pub const REGISTRY_GENERIC: u16 = 3000;
    pub const REGISTRY_NOT_FOUND: u16 = 3004;
    pub const REGISTRY_CONFLICT: u16 = 3005;
    pub const REGISTRY_LOCK_FAILED: u16 = 3007;
    pub const REGISTRY_TIMEOUT: u16 = 3009;
    pub const REGISTRY_BACKEND_ERROR: u16 = 3010;
    pub const REGISTRY_SERIALIZATION_ERROR: u16 = 3011;
    pub const REGISTRY_UNAVAILABLE: u16 = 3012;
    pub const REGISTRY_CONFIGURATION: u16 = 3013;

    // Execution errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_UNIT_FAILED: u16 = 4001;
    pub const EXEC_CANCELLED: u16 = 4002;
    pub const EXEC_UNKNOWN_DATABASE: u16 = 4003;
    pub const EXEC_TASK_PANICKED: u16 = 4004;
    pub const EXEC_REFRESH_FAILED: u16 = 4005;

    // Metadata errors (5000-5999)
    pub const METADATA_GENERIC: u16 = 5000;
    pub const METADATA_TABLE_NOT_FOUND: u16 = 5001;
    pub const METADATA_DATABASE_NOT_FOUND: u16 = 5002;
    pub const METADATA_PERSIST_FAILED: u16 = 5003;
    pub const METADATA_INVALID_RULE: u16 = 5004;

    // Cluster errors (6000-6999)
    pub const CLUSTER_GENERIC: u16 = 6000;
    pub const CLUSTER_MISSING_REPOSITORY: u16 = 6001;
    pub const CLUSTER_WORKER_ID_EXHAUSTED: u16 = 6002;
    pub const CLUSTER_WORKER_ID_TIMEOUT: u16 = 6003;
    pub const CLUSTER_REGISTRATION_FAILED: u16 = 6004;
    pub const CLUSTER_ALREADY_INITIALIZED: u16 = 6005;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        ErrorCode::CONFIG_GENERIC => "General configuration error",
        ErrorCode::CONFIG_NOT_FOUND => "Configuration file not found",
        ErrorCode::CONFIG_PARSE_ERROR => "Configuration file could not be parsed",
        ErrorCode::CONFIG_UNSUPPORTED_FORMAT => "Configuration file format is not supported",
        ErrorCode::CONFIG_INVALID_VALUE => "Configuration value is invalid",

        ErrorCode::REGISTRY_GENERIC => "General registry error",
        ErrorCode::REGISTRY_NOT_FOUND => "Registry key not found",
        ErrorCode::REGISTRY_CONFLICT => "Registry key or lock already held",
        ErrorCode::REGISTRY_LOCK_FAILED => "Registry lock operation failed",
        ErrorCode::REGISTRY_TIMEOUT => "Registry operation timed out",
        ErrorCode::REGISTRY_BACKEND_ERROR => "Registry backend error",
        ErrorCode::REGISTRY_SERIALIZATION_ERROR => "Registry value could not be (de)serialized",
        ErrorCode::REGISTRY_UNAVAILABLE => "Registry is unreachable",
        ErrorCode::REGISTRY_CONFIGURATION => "Registry configuration is invalid",

        ErrorCode::EXEC_GENERIC => "General execution error",
        ErrorCode::EXEC_UNIT_FAILED => "An execution unit failed on its data source",
        ErrorCode::EXEC_CANCELLED => "Statement execution was cancelled",
        ErrorCode::EXEC_UNKNOWN_DATABASE => "Statement targets an unknown database",
        ErrorCode::EXEC_TASK_PANICKED => "An execution task panicked",
        ErrorCode::EXEC_REFRESH_FAILED => "Metadata refresh after execution failed",

        ErrorCode::METADATA_GENERIC => "General metadata error",
        ErrorCode::METADATA_TABLE_NOT_FOUND => "Table not found in cached metadata",
        ErrorCode::METADATA_DATABASE_NOT_FOUND => "Database not found in cached metadata",
        ErrorCode::METADATA_PERSIST_FAILED => "Metadata could not be persisted",
        ErrorCode::METADATA_INVALID_RULE => "Rule configuration is invalid",

        ErrorCode::CLUSTER_GENERIC => "General cluster error",
        ErrorCode::CLUSTER_MISSING_REPOSITORY => "Cluster repository configuration is missing",
        ErrorCode::CLUSTER_WORKER_ID_EXHAUSTED => "No worker id is free in the configured range",
        ErrorCode::CLUSTER_WORKER_ID_TIMEOUT => "Worker id allocation timed out",
        ErrorCode::CLUSTER_REGISTRATION_FAILED => "Instance registration failed",
        ErrorCode::CLUSTER_ALREADY_INITIALIZED => "Instance context already initialized",

        _ => "Unknown error",
    }
}
