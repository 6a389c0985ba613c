//! Fan-out of execution groups over a bounded set of tasks

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::callback::ExecutorCallback;
use super::error::{ExecutionError, ExecutionResult};
use super::process::Process;
use super::unit::{ExecutionGroup, ExecutionGroupContext};

pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Runs execution groups concurrently and units within a group in order.
///
/// Results come back in submission order: groups in context order, units in
/// group order. The first failing unit aborts every other group.
#[derive(Debug, Clone)]
pub struct ExecutorEngine {
    max_concurrency: usize,
}

impl Default for ExecutorEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl ExecutorEngine {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub async fn execute<T>(
        &self,
        group_context: &ExecutionGroupContext,
        process: Arc<Process>,
        callback: Arc<dyn ExecutorCallback<T>>,
    ) -> ExecutionResult<Vec<T>>
    where
        T: Send + 'static,
    {
        if process.is_cancelled() {
            return Err(cancelled(&process));
        }

        let group_count = group_context.groups.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, group) in group_context.groups.iter().cloned().enumerate() {
            let semaphore = semaphore.clone();
            let process = process.clone();
            let callback = callback.clone();

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| cancelled(&process))?;
                let results = execute_group(&group, &process, callback.as_ref()).await?;
                Ok::<_, ExecutionError>((index, results))
            });
        }

        let mut slots: Vec<Option<Vec<T>>> = (0..group_count).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((index, results))) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(results);
                    }
                }
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    warn!(
                        "Execution task of process {} did not finish: {}",
                        process.id(),
                        join_err
                    );
                    return Err(ExecutionError::TaskPanicked(join_err.to_string()));
                }
            }
        }

        Ok(slots.into_iter().flatten().flatten().collect())
    }
}

async fn execute_group<T>(
    group: &ExecutionGroup,
    process: &Process,
    callback: &dyn ExecutorCallback<T>,
) -> ExecutionResult<Vec<T>> {
    let signal = process.cancel_token();
    let mut results = Vec::with_capacity(group.units.len());

    for unit in &group.units {
        if signal.is_cancelled() {
            return Err(cancelled(process));
        }
        debug!(
            "Dispatching unit to {} (connection {}) for process {}",
            unit.data_source,
            group.connection_offset,
            process.id()
        );

        let outcome = tokio::select! {
            biased;
            _ = signal.cancelled() => return Err(cancelled(process)),
            outcome = callback.execute(unit) => outcome,
        };

        let value = outcome.map_err(|source| ExecutionError::UnitFailed {
            data_source: unit.data_source.clone(),
            sql: unit.sql().to_string(),
            source,
        })?;
        process.complete_unit();
        results.push(value);
    }

    Ok(results)
}

fn cancelled(process: &Process) -> ExecutionError {
    ExecutionError::Cancelled {
        process_id: process.id().to_string(),
    }
}
