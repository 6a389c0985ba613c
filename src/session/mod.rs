//! Statement, query and routing context
//!
//! These types are produced by the parser and router in front of the
//! executor and are consumed read-only from here on.

pub mod query;
pub mod route;
pub mod statement;

pub use query::QueryContext;
pub use route::{RouteMapper, RouteUnit};
pub use statement::{ColumnDefinition, SqlStatementContext, StatementKind};
