//! # shardcore
//!
//! Execution and cluster coordination core of a sharding database middleware.
//!
//! A routed statement arrives as execution units grouped by physical
//! connection. The [`executor`] runs the groups concurrently through a
//! caller-supplied callback, reconciles per-shard results according to the
//! active [`rule`]s and refreshes cached [`metadata`]. The [`cluster`] layer
//! keeps node identity, worker ids, global locks and rule changes consistent
//! across nodes through a [`registry`].
//!
//! ## Modules
//!
//! - `cluster` - Node bootstrap, instance context, worker ids, global locks, change propagation
//! - `config` - Node configuration loading and validation
//! - `error` - Crate-wide error type with stable error codes
//! - `executor` - Execution engine, callbacks, process tracking
//! - `metadata` - Cached database metadata and its post-execution refresh
//! - `registry` - Client contract of the cluster repository plus an in-memory backend
//! - `rule` - Sharding, read-write splitting, broadcast and single table rules
//! - `session` - Statement, query and route contexts produced upstream
pub mod cluster;
pub mod config;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod registry;
pub mod rule;
pub mod session;

pub use error::{ErrorCode, ShardError};

/// Result type used at the crate's outer surface
pub type Result<T> = std::result::Result<T, ShardError>;
