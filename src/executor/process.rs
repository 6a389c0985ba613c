//! Tracking of in-flight distributed statements
//!
//! Every statement registers a [`Process`] keyed by the process id of its
//! execution group context. The process carries the cancellation signal for
//! its units and is removed again when the statement finishes, however it
//! finishes: [`ProcessGuard`] completes tracking on drop, so an error, a
//! panic in a callback or a dropped future all leave the registry clean.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::unit::ExecutionGroupContext;
use crate::session::QueryContext;

/// An in-flight statement
pub struct Process {
    id: String,
    database: String,
    sql: String,
    started_at: DateTime<Utc>,
    total_units: usize,
    completed_units: AtomicUsize,
    cancel: CancellationToken,
}

impl Process {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub(crate) fn complete_unit(&self) {
        self.completed_units.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ProcessSnapshot {
        ProcessSnapshot {
            id: self.id.clone(),
            database: self.database.clone(),
            sql: self.sql.clone(),
            started_at: self.started_at,
            total_units: self.total_units,
            completed_units: self.completed_units.load(Ordering::Relaxed),
            cancelled: self.cancel.is_cancelled(),
        }
    }
}

/// Serializable view of a process for introspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub id: String,
    pub database: String,
    pub sql: String,
    pub started_at: DateTime<Utc>,
    pub total_units: usize,
    pub completed_units: usize,
    pub cancelled: bool,
}

/// Registry of in-flight statements, shared by all executors of a node.
///
/// Each process token is a child of the registry token, so
/// [`ProcessRegistry::cancel_all`] reaches every running statement.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    processes: Arc<DashMap<String, Arc<Process>>>,
    shutdown: CancellationToken,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a statement; tracking completes when the guard is dropped
    pub fn begin(
        &self,
        group_context: &ExecutionGroupContext,
        query_context: &QueryContext,
    ) -> ProcessGuard {
        let process = Arc::new(Process {
            id: group_context.process_id().to_string(),
            database: query_context.target_database().to_string(),
            sql: query_context.sql.clone(),
            started_at: Utc::now(),
            total_units: group_context.unit_count(),
            completed_units: AtomicUsize::new(0),
            cancel: self.shutdown.child_token(),
        });

        if let Some(previous) = self
            .processes
            .insert(process.id.clone(), process.clone())
        {
            warn!(
                "Process {} was already registered, replacing it",
                previous.id
            );
        }
        debug!(
            "Process {} started with {} units",
            process.id, process.total_units
        );

        ProcessGuard {
            registry: self.clone(),
            process,
        }
    }

    /// Remove a process; unknown ids are ignored
    pub fn complete(&self, process_id: &str) {
        if self.processes.remove(process_id).is_some() {
            debug!("Process {} completed", process_id);
        }
    }

    /// Cancel a running process; returns whether it was found
    pub fn cancel(&self, process_id: &str) -> bool {
        match self.processes.get(process_id) {
            Some(process) => {
                info!("Cancelling process {}", process_id);
                process.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every running process and any started later
    pub fn cancel_all(&self) {
        if !self.shutdown.is_cancelled() {
            info!("Cancelling {} running processes", self.processes.len());
        }
        self.shutdown.cancel();
    }

    pub fn get(&self, process_id: &str) -> Option<Arc<Process>> {
        self.processes.get(process_id).map(|p| p.value().clone())
    }

    /// Snapshots of all running processes, oldest first
    pub fn list(&self) -> Vec<ProcessSnapshot> {
        let mut snapshots: Vec<_> = self
            .processes
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

/// Completes process tracking when dropped
pub struct ProcessGuard {
    registry: ProcessRegistry,
    process: Arc<Process>,
}

impl ProcessGuard {
    pub fn process(&self) -> Arc<Process> {
        self.process.clone()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        // Only remove our own registration, a reused id may belong to someone else now
        let removed = self
            .registry
            .processes
            .remove_if(&self.process.id, |_, p| Arc::ptr_eq(p, &self.process));
        if removed.is_some() {
            debug!("Process {} completed", self.process.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::unit::{ExecutionGroup, ExecutionUnit};
    use crate::session::SqlStatementContext;

    fn contexts(id: &str) -> (ExecutionGroupContext, QueryContext) {
        let groups = ExecutionGroup::partition(
            vec![
                ExecutionUnit::new("ds_0", "SELECT 1"),
                ExecutionUnit::new("ds_1", "SELECT 1"),
            ],
            1,
        );
        (
            ExecutionGroupContext::new(groups, id),
            QueryContext::new(SqlStatementContext::select(&["t"]), "SELECT 1", "db"),
        )
    }

    #[test]
    fn test_complete_is_idempotent() {
        let registry = ProcessRegistry::new();
        let (group, query) = contexts("p-1");

        let guard = registry.begin(&group, &query);
        assert_eq!(registry.len(), 1);

        registry.complete("p-1");
        registry.complete("p-1");
        registry.complete("never-started");
        drop(guard);

        assert!(registry.is_empty());
    }

    #[test]
    fn test_guard_completes_on_drop() {
        let registry = ProcessRegistry::new();
        let (group, query) = contexts("p-2");
        {
            let guard = registry.begin(&group, &query);
            guard.process().complete_unit();
            let listed = registry.list();
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].total_units, 2);
            assert_eq!(listed[0].completed_units, 1);
            assert_eq!(listed[0].database, "db");
        }
        assert!(registry.get("p-2").is_none());
    }

    #[test]
    fn test_stale_guard_keeps_newer_registration() {
        let registry = ProcessRegistry::new();
        let (group, query) = contexts("p-3");

        let first = registry.begin(&group, &query);
        let second = registry.begin(&group, &query);
        drop(first);
        assert!(registry.get("p-3").is_some());
        drop(second);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiters() {
        let registry = ProcessRegistry::new();
        let (group, query) = contexts("p-4");
        let guard = registry.begin(&group, &query);
        let process = guard.process();

        let waiter = tokio::spawn(async move { process.cancel_token().cancelled().await });
        tokio::task::yield_now().await;

        assert!(registry.cancel("p-4"));
        assert!(!registry.cancel("missing"));
        waiter.await.unwrap();
        assert!(registry.list()[0].cancelled);
    }

    #[tokio::test]
    async fn test_cancel_all_reaches_running_and_later_processes() {
        let registry = ProcessRegistry::new();
        let (group, query) = contexts("p-5");
        let running = registry.begin(&group, &query);
        let waiter = tokio::spawn({
            let process = running.process();
            async move { process.cancel_token().cancelled().await }
        });

        registry.cancel_all();
        waiter.await.unwrap();
        assert!(running.process().is_cancelled());

        let (group, query) = contexts("p-6");
        let late = registry.begin(&group, &query);
        assert!(late.process().is_cancelled());
    }
}
