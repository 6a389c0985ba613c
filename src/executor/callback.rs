//! Pluggable per-unit execution

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::marker::PhantomData;

use super::unit::ExecutionUnit;

/// Rows returned by a query unit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl QueryResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Runs one execution unit against its physical data source.
///
/// Implemented once per transport by the protocol layer. `T` is
/// [`QueryResult`] for queries, `Option<i64>` for update counts and
/// `Option<bool>` for generic execution, `None` standing for a null result.
#[async_trait]
pub trait ExecutorCallback<T>: Send + Sync {
    async fn execute(&self, unit: &ExecutionUnit) -> anyhow::Result<T>;
}

/// Callback backed by a closure
pub struct FnCallback<F, T> {
    f: F,
    _result: PhantomData<fn() -> T>,
}

/// Adapt an async closure into an [`ExecutorCallback`]
pub fn fn_callback<F, Fut, T>(f: F) -> FnCallback<F, T>
where
    F: Fn(ExecutionUnit) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    FnCallback {
        f,
        _result: PhantomData,
    }
}

#[async_trait]
impl<F, Fut, T> ExecutorCallback<T> for FnCallback<F, T>
where
    F: Fn(ExecutionUnit) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
{
    async fn execute(&self, unit: &ExecutionUnit) -> anyhow::Result<T> {
        (self.f)(unit.clone()).await
    }
}
