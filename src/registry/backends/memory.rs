//! In-memory lease-based registry backend
//!
//! A [`MemoryRegistry`] plays the role of the coordination server; every node
//! connects to it with its own [`MemoryRepository`] client holding one lease
//! session. Servers are shared per namespace inside the process, so several
//! nodes started in one test runtime see the same key space.

use async_trait::async_trait;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::registry::{
    config::MEMORY_REPOSITORY_TYPE,
    error::{RegistryError, RegistryResult},
    lock::{RegistryLock, RegistryLockGuard},
    traits::ClusterRepository,
    types::{ChangeKind, ConnectionStatus, DataChangedEvent, HealthStatus, RegistryWatch},
};

type SessionId = u64;

const EVENT_CHANNEL_CAPACITY: usize = 1024;

static SERVERS: Lazy<DashMap<String, MemoryRegistry>> = Lazy::new(DashMap::new);

struct Entry {
    value: String,
    owner: Option<SessionId>,
}

struct LockEntry {
    lock: RegistryLock,
    owner: SessionId,
}

#[derive(Default)]
struct RegistryState {
    entries: BTreeMap<String, Entry>,
    sessions: HashMap<SessionId, Instant>,
    locks: HashMap<String, LockEntry>,
    next_session: SessionId,
}

impl RegistryState {
    fn put(&mut self, key: &str, value: &str, owner: Option<SessionId>) -> DataChangedEvent {
        let kind = if self.entries.contains_key(key) {
            ChangeKind::Updated
        } else {
            ChangeKind::Added
        };
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                owner,
            },
        );
        DataChangedEvent::new(key, value, kind)
    }

    fn remove_session(&mut self, session: SessionId) -> Vec<DataChangedEvent> {
        self.sessions.remove(&session);
        self.locks.retain(|_, entry| entry.owner != session);

        let owned: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.owner == Some(session))
            .map(|(key, _)| key.clone())
            .collect();

        owned
            .into_iter()
            .filter_map(|key| {
                self.entries
                    .remove(&key)
                    .map(|entry| DataChangedEvent::new(key, entry.value, ChangeKind::Deleted))
            })
            .collect()
    }

    fn purge_expired(&mut self, now: Instant) -> Vec<DataChangedEvent> {
        let expired: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(session, _)| *session)
            .collect();

        let mut events = Vec::new();
        for session in expired {
            warn!("Lease session {} expired, dropping its ephemeral keys", session);
            events.extend(self.remove_session(session));
        }
        events
    }
}

struct Shared {
    namespace: String,
    state: Mutex<RegistryState>,
    events: broadcast::Sender<DataChangedEvent>,
    available: AtomicBool,
}

impl Shared {
    fn publish(&self, events: Vec<DataChangedEvent>) {
        for event in events {
            // No receivers is fine
            let _ = self.events.send(event);
        }
    }
}

/// In-process coordination server
#[derive(Clone)]
pub struct MemoryRegistry {
    shared: Arc<Shared>,
}

impl MemoryRegistry {
    /// Create a standalone server not visible through [`MemoryRegistry::shared`]
    pub fn new(namespace: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                namespace: namespace.into(),
                state: Mutex::new(RegistryState::default()),
                events,
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Process-wide server for a namespace, created on first use
    pub fn shared(namespace: &str) -> Self {
        SERVERS
            .entry(namespace.to_string())
            .or_insert_with(|| Self::new(namespace))
            .clone()
    }

    pub fn namespace(&self) -> &str {
        &self.shared.namespace
    }

    /// Mark the server reachable or unreachable
    pub fn set_available(&self, available: bool) {
        self.shared.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.shared.available.load(Ordering::SeqCst)
    }

    /// Open a client with a fresh lease session
    pub async fn connect(&self, lease_ttl: Duration) -> RegistryResult<MemoryRepository> {
        if !self.is_available() {
            return Err(RegistryError::connection(format!(
                "registry '{}' is unreachable",
                self.shared.namespace
            )));
        }

        let session = {
            let mut state = self.shared.state.lock().await;
            state.next_session += 1;
            let session = state.next_session;
            state.sessions.insert(session, Instant::now() + lease_ttl);
            session
        };

        debug!(
            "Opened lease session {} on registry '{}' (ttl {:?})",
            session, self.shared.namespace, lease_ttl
        );

        let keepalive = spawn_keepalive(self.shared.clone(), session, lease_ttl);

        Ok(MemoryRepository {
            server: self.clone(),
            session,
            closed: AtomicBool::new(false),
            keepalive,
        })
    }
}

fn spawn_keepalive(shared: Arc<Shared>, session: SessionId, ttl: Duration) -> JoinHandle<()> {
    let period = (ttl / 3).max(Duration::from_millis(1));

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;

        loop {
            ticker.tick().await;

            // An unreachable server cannot renew leases
            if !shared.available.load(Ordering::SeqCst) {
                continue;
            }

            let mut state = shared.state.lock().await;
            let now = Instant::now();
            let events = state.purge_expired(now);
            let renewed = match state.sessions.get_mut(&session) {
                Some(expiry) => {
                    *expiry = now + ttl;
                    true
                }
                None => false,
            };
            shared.publish(events);
            drop(state);

            if !renewed {
                warn!("Lease session {} is gone, stopping keep-alive", session);
                break;
            }
        }
    })
}

/// Client of a [`MemoryRegistry`] bound to one lease session
pub struct MemoryRepository {
    server: MemoryRegistry,
    session: SessionId,
    closed: AtomicBool,
    keepalive: JoinHandle<()>,
}

impl MemoryRepository {
    /// Identifier of this client's lease session
    pub fn session_id(&self) -> u64 {
        self.session
    }

    fn holder(&self) -> String {
        format!("{}-session-{}", self.server.namespace(), self.session)
    }

    async fn state(&self) -> RegistryResult<MutexGuard<'_, RegistryState>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(RegistryError::connection("repository is closed"));
        }
        if !self.server.is_available() {
            return Err(RegistryError::unavailable(format!(
                "registry '{}' is unreachable",
                self.server.namespace()
            )));
        }

        let mut state = self.server.shared.state.lock().await;
        let events = state.purge_expired(Instant::now());
        self.server.shared.publish(events);
        Ok(state)
    }

    async fn live_state(&self) -> RegistryResult<MutexGuard<'_, RegistryState>> {
        let state = self.state().await?;
        if !state.sessions.contains_key(&self.session) {
            return Err(RegistryError::connection(format!(
                "lease session {} expired",
                self.session
            )));
        }
        Ok(state)
    }
}

impl Drop for MemoryRepository {
    fn drop(&mut self) {
        self.keepalive.abort();
    }
}

#[async_trait]
impl ClusterRepository for MemoryRepository {
    fn backend_type(&self) -> &str {
        MEMORY_REPOSITORY_TYPE
    }

    async fn get(&self, key: &str) -> RegistryResult<Option<String>> {
        let state = self.state().await?;
        Ok(state.entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn get_children_keys(&self, key: &str) -> RegistryResult<Vec<String>> {
        let state = self.state().await?;
        let prefix = format!("{}/", key.trim_end_matches('/'));

        let mut children: Vec<String> = state
            .entries
            .range(prefix.clone()..)
            .take_while(|(k, _)| k.starts_with(&prefix))
            .filter_map(|(k, _)| k[prefix.len()..].split('/').next())
            .filter(|child| !child.is_empty())
            .map(str::to_string)
            .collect();
        children.sort();
        children.dedup();
        Ok(children)
    }

    async fn persist(&self, key: &str, value: &str) -> RegistryResult<()> {
        let mut state = self.state().await?;
        let event = state.put(key, value, None);
        self.server.shared.publish(vec![event]);
        debug!("Persisted {}", key);
        Ok(())
    }

    async fn persist_ephemeral(&self, key: &str, value: &str) -> RegistryResult<()> {
        let mut state = self.live_state().await?;
        let event = state.put(key, value, Some(self.session));
        self.server.shared.publish(vec![event]);
        debug!("Persisted ephemeral {} (session {})", key, self.session);
        Ok(())
    }

    async fn persist_exclusive_ephemeral(&self, key: &str, value: &str) -> RegistryResult<bool> {
        let mut state = self.live_state().await?;
        if state.entries.contains_key(key) {
            return Ok(false);
        }
        let event = state.put(key, value, Some(self.session));
        self.server.shared.publish(vec![event]);
        Ok(true)
    }

    async fn delete(&self, key: &str) -> RegistryResult<()> {
        let mut state = self.state().await?;
        let prefix = format!("{}/", key.trim_end_matches('/'));

        let doomed: Vec<String> = state
            .entries
            .keys()
            .filter(|k| k.as_str() == key || k.starts_with(&prefix))
            .cloned()
            .collect();

        let events: Vec<DataChangedEvent> = doomed
            .into_iter()
            .filter_map(|k| {
                state
                    .entries
                    .remove(&k)
                    .map(|entry| DataChangedEvent::new(k, entry.value, ChangeKind::Deleted))
            })
            .collect();
        self.server.shared.publish(events);
        Ok(())
    }

    async fn watch(&self, prefix: &str) -> RegistryResult<RegistryWatch> {
        // Subscribe under the state lock so no change slips between check and subscribe
        let _state = self.state().await?;
        Ok(RegistryWatch::new(prefix, self.server.shared.events.subscribe()))
    }

    async fn try_lock(&self, key: &str) -> RegistryResult<Box<dyn RegistryLockGuard>> {
        let mut state = self.live_state().await?;

        if let Some(existing) = state.locks.get(key) {
            return Err(RegistryError::conflict(format!(
                "Lock already held: {} by {}",
                key, existing.lock.holder
            )));
        }

        let lock = RegistryLock::new(key.to_string(), self.holder());
        state.locks.insert(
            key.to_string(),
            LockEntry {
                lock: lock.clone(),
                owner: self.session,
            },
        );

        Ok(Box::new(MemoryLockGuard {
            lock,
            server: self.server.clone(),
        }))
    }

    async fn health_check(&self) -> RegistryResult<HealthStatus> {
        let mut errors = Vec::new();
        if !self.server.is_available() {
            errors.push(format!("registry '{}' is unreachable", self.server.namespace()));
        }
        if self.closed.load(Ordering::SeqCst) {
            errors.push("repository is closed".to_string());
        }
        let healthy = errors.is_empty();

        Ok(HealthStatus {
            healthy,
            backend_type: MEMORY_REPOSITORY_TYPE.to_string(),
            connection_status: if healthy {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Disconnected
            },
            errors,
        })
    }

    async fn close(&self) -> RegistryResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.keepalive.abort();

        let mut state = self.server.shared.state.lock().await;
        let events = state.remove_session(self.session);
        self.server.shared.publish(events);

        info!(
            "Closed lease session {} on registry '{}'",
            self.session,
            self.server.namespace()
        );
        Ok(())
    }
}

/// Lock guard for the memory backend
struct MemoryLockGuard {
    lock: RegistryLock,
    server: MemoryRegistry,
}

#[async_trait]
impl RegistryLockGuard for MemoryLockGuard {
    fn lock_info(&self) -> &RegistryLock {
        &self.lock
    }

    async fn release(self: Box<Self>) -> RegistryResult<()> {
        let mut state = self.server.shared.state.lock().await;
        let held_by_us = state
            .locks
            .get(&self.lock.key)
            .is_some_and(|entry| entry.lock.token == self.lock.token);
        if held_by_us {
            state.locks.remove(&self.lock.key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    #[tokio::test]
    async fn test_persist_get_and_children() {
        let server = MemoryRegistry::new("children");
        let repo = server.connect(TTL).await.unwrap();

        repo.persist("/nodes/online/proxy/a", "1").await.unwrap();
        repo.persist("/nodes/online/proxy/b", "2").await.unwrap();
        repo.persist("/nodes/online/jdbc/c", "3").await.unwrap();

        assert_eq!(
            repo.get("/nodes/online/proxy/a").await.unwrap().as_deref(),
            Some("1")
        );
        assert_eq!(
            repo.get_children_keys("/nodes/online").await.unwrap(),
            vec!["jdbc".to_string(), "proxy".to_string()]
        );
        assert_eq!(
            repo.get_children_keys("/nodes/online/proxy").await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(repo.get_children_keys("/missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_is_recursive() {
        let server = MemoryRegistry::new("delete");
        let repo = server.connect(TTL).await.unwrap();

        repo.persist("/metadata/db", "x").await.unwrap();
        repo.persist("/metadata/db/tables/t", "y").await.unwrap();
        repo.persist("/metadata/db2", "z").await.unwrap();

        repo.delete("/metadata/db").await.unwrap();

        assert!(repo.get("/metadata/db").await.unwrap().is_none());
        assert!(repo.get("/metadata/db/tables/t").await.unwrap().is_none());
        assert_eq!(repo.get("/metadata/db2").await.unwrap().as_deref(), Some("z"));
    }

    #[tokio::test]
    async fn test_exclusive_ephemeral_claims_once() {
        let server = MemoryRegistry::new("exclusive");
        let first = server.connect(TTL).await.unwrap();
        let second = server.connect(TTL).await.unwrap();

        assert!(first
            .persist_exclusive_ephemeral("/reservation/worker_id/0", "a")
            .await
            .unwrap());
        assert!(!second
            .persist_exclusive_ephemeral("/reservation/worker_id/0", "b")
            .await
            .unwrap());

        first.close().await.unwrap();
        assert!(second
            .persist_exclusive_ephemeral("/reservation/worker_id/0", "b")
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_close_drops_ephemeral_keys_and_notifies_watchers() {
        let server = MemoryRegistry::new("close");
        let owner = server.connect(TTL).await.unwrap();
        let observer = server.connect(TTL).await.unwrap();

        owner.persist_ephemeral("/nodes/a", "on").await.unwrap();
        owner.persist("/states/x", "kept").await.unwrap();
        let mut watch = observer.watch("/nodes").await.unwrap();

        owner.close().await.unwrap();

        let event = watch.next().await.unwrap();
        assert_eq!(event.key, "/nodes/a");
        assert_eq!(event.kind, ChangeKind::Deleted);
        assert!(observer.get("/nodes/a").await.unwrap().is_none());
        assert_eq!(observer.get("/states/x").await.unwrap().as_deref(), Some("kept"));
        assert!(owner.get("/states/x").await.is_err());
    }

    #[tokio::test]
    async fn test_lease_expires_without_keepalive() {
        let server = MemoryRegistry::new("expiry");
        let ttl = Duration::from_millis(60);
        let crashed = server.connect(ttl).await.unwrap();
        let survivor = server.connect(ttl).await.unwrap();

        crashed.persist_ephemeral("/nodes/crashed", "on").await.unwrap();
        let mut watch = survivor.watch("/nodes").await.unwrap();

        // Dropping the client stops its keep-alive without closing the session
        drop(crashed);

        let event = tokio::time::timeout(Duration::from_secs(2), watch.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.kind, ChangeKind::Deleted);
        assert!(survivor.get("/nodes/crashed").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_locks_are_exclusive_and_released() {
        let server = MemoryRegistry::new("locks");
        let first = server.connect(TTL).await.unwrap();
        let second = server.connect(TTL).await.unwrap();

        let guard = first.try_lock("/lock/global/locks/metadata").await.unwrap();
        let err = second
            .try_lock("/lock/global/locks/metadata")
            .await
            .err()
            .unwrap();
        assert!(err.is_conflict());

        guard.release().await.unwrap();
        assert!(second.try_lock("/lock/global/locks/metadata").await.is_ok());
    }

    #[tokio::test]
    async fn test_unavailable_server() {
        let server = MemoryRegistry::new("down");
        let repo = server.connect(TTL).await.unwrap();

        server.set_available(false);

        assert!(matches!(
            server.connect(TTL).await.err(),
            Some(RegistryError::Connection(_))
        ));
        assert!(matches!(
            repo.get("/a").await,
            Err(RegistryError::Unavailable(_))
        ));
        assert!(!repo.health_check().await.unwrap().healthy);

        server.set_available(true);
        assert!(repo.health_check().await.unwrap().healthy);
    }

    #[tokio::test]
    async fn test_shared_server_per_namespace() {
        let a = MemoryRegistry::shared("memory-shared-test");
        let b = MemoryRegistry::shared("memory-shared-test");

        let writer = a.connect(TTL).await.unwrap();
        let reader = b.connect(TTL).await.unwrap();
        writer.persist("/k", "v").await.unwrap();
        assert_eq!(reader.get("/k").await.unwrap().as_deref(), Some("v"));
    }
}
