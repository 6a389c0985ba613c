//! Execution engine
//!
//! Routed statements arrive as an [`ExecutionGroupContext`]: units grouped by
//! physical connection. [`DriverExecutor`] tracks each statement in the
//! [`ProcessRegistry`], fans the groups out through [`ExecutorEngine`] using a
//! caller-supplied [`ExecutorCallback`], reconciles the per-unit results and
//! refreshes cached metadata before returning.

pub mod callback;
pub mod driver;
pub mod engine;
pub mod error;
pub mod process;
pub mod unit;

pub use callback::{fn_callback, ExecutorCallback, FnCallback, QueryResult};
pub use driver::DriverExecutor;
pub use engine::{ExecutorEngine, DEFAULT_MAX_CONCURRENCY};
pub use error::{ExecutionError, ExecutionResult};
pub use process::{Process, ProcessGuard, ProcessRegistry, ProcessSnapshot};
pub use unit::{ExecutionGroup, ExecutionGroupContext, ExecutionUnit, ReportContext, SqlUnit};
