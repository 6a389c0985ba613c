//! Cluster-unique worker id allocation

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::{ClusterError, ClusterResult};
use super::node_path;
use super::registry_center::RegistryCenter;

/// Inclusive upper bound of the claim range when none is configured
pub const DEFAULT_MAX_WORKER_ID: u32 = 1023;

/// Claims the lowest free worker id through lease-bound reservation keys.
///
/// A reservation at `/reservation/worker_id/{n}` holds the owning instance id
/// and disappears with the owner's lease, so a crashed node frees its id once
/// its session expires.
pub struct ClusterWorkerIdGenerator {
    registry_center: Arc<RegistryCenter>,
    instance_id: String,
    max_worker_id: u32,
    timeout: Duration,
}

impl ClusterWorkerIdGenerator {
    pub fn new(
        registry_center: Arc<RegistryCenter>,
        instance_id: impl Into<String>,
        max_worker_id: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            registry_center,
            instance_id: instance_id.into(),
            max_worker_id,
            timeout,
        }
    }

    pub fn max_worker_id(&self) -> u32 {
        self.max_worker_id
    }

    /// Allocate a worker id, reusing the one this instance already holds
    pub async fn generate(&self) -> ClusterResult<u32> {
        match tokio::time::timeout(self.timeout, self.allocate()).await {
            Ok(result) => result,
            Err(_) => Err(ClusterError::WorkerIdTimeout(self.timeout)),
        }
    }

    async fn allocate(&self) -> ClusterResult<u32> {
        let worker_id = match self.reuse_existing().await? {
            Some(worker_id) => {
                info!("Reusing worker id {} for {}", worker_id, self.instance_id);
                worker_id
            }
            None => self.claim_lowest_free().await?,
        };

        self.registry_center
            .compute_nodes()
            .persist_worker_id(&self.instance_id, worker_id)
            .await?;
        Ok(worker_id)
    }

    async fn reuse_existing(&self) -> ClusterResult<Option<u32>> {
        let Some(worker_id) = self
            .registry_center
            .compute_nodes()
            .load_worker_id(&self.instance_id)
            .await?
        else {
            return Ok(None);
        };

        if worker_id > self.max_worker_id {
            warn!(
                "Persisted worker id {} of {} is outside 0..={}",
                worker_id, self.instance_id, self.max_worker_id
            );
            return Ok(None);
        }

        let repository = self.registry_center.repository();
        let reservation = node_path::worker_id_reservation_path(worker_id);
        match repository.get(&reservation).await? {
            None => Ok(repository
                .persist_exclusive_ephemeral(&reservation, &self.instance_id)
                .await?
                .then_some(worker_id)),
            Some(owner) if owner == self.instance_id => {
                // Bind the reservation to the current session
                repository
                    .persist_ephemeral(&reservation, &self.instance_id)
                    .await?;
                Ok(Some(worker_id))
            }
            Some(owner) => {
                debug!("Worker id {} now belongs to {}", worker_id, owner);
                Ok(None)
            }
        }
    }

    async fn claim_lowest_free(&self) -> ClusterResult<u32> {
        let repository = self.registry_center.repository();

        for candidate in 0..=self.max_worker_id {
            let reservation = node_path::worker_id_reservation_path(candidate);
            if repository
                .persist_exclusive_ephemeral(&reservation, &self.instance_id)
                .await?
            {
                info!("Claimed worker id {} for {}", candidate, self.instance_id);
                return Ok(candidate);
            }
            debug!("Worker id {} is taken", candidate);
        }

        Err(ClusterError::WorkerIdExhausted {
            max: self.max_worker_id,
        })
    }

    /// Free the reservation so another instance may claim the id
    pub async fn release(&self, worker_id: u32) -> ClusterResult<()> {
        let repository = self.registry_center.repository();
        let reservation = node_path::worker_id_reservation_path(worker_id);

        if repository.get(&reservation).await?.as_deref() == Some(self.instance_id.as_str()) {
            repository.delete(&reservation).await?;
        }
        self.registry_center
            .compute_nodes()
            .remove_worker_id(&self.instance_id)
            .await?;
        debug!("Released worker id {} of {}", worker_id, self.instance_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ClusterRepository, MemoryRegistry};

    async fn generator(
        server: &MemoryRegistry,
        instance_id: &str,
        max_worker_id: u32,
    ) -> ClusterWorkerIdGenerator {
        let repository: Arc<dyn ClusterRepository> =
            Arc::new(server.connect(Duration::from_secs(30)).await.unwrap());
        ClusterWorkerIdGenerator::new(
            Arc::new(RegistryCenter::new(repository)),
            instance_id,
            max_worker_id,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_claims_lowest_free_id() {
        let server = MemoryRegistry::new("worker-lowest");
        let a = generator(&server, "a", 7).await;
        let b = generator(&server, "b", 7).await;

        assert_eq!(a.generate().await.unwrap(), 0);
        assert_eq!(b.generate().await.unwrap(), 1);

        a.release(0).await.unwrap();
        let c = generator(&server, "c", 7).await;
        assert_eq!(c.generate().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_generate_twice_reuses_claim() {
        let server = MemoryRegistry::new("worker-reuse");
        let a = generator(&server, "a", 7).await;

        assert_eq!(a.generate().await.unwrap(), 0);
        assert_eq!(a.generate().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_range_fails() {
        let server = MemoryRegistry::new("worker-exhausted");
        let a = generator(&server, "a", 0).await;
        let b = generator(&server, "b", 0).await;

        assert_eq!(a.generate().await.unwrap(), 0);
        assert!(matches!(
            b.generate().await,
            Err(ClusterError::WorkerIdExhausted { max: 0 })
        ));
    }

    #[tokio::test]
    async fn test_release_ignores_foreign_reservation() {
        let server = MemoryRegistry::new("worker-foreign");
        let a = generator(&server, "a", 3).await;
        let b = generator(&server, "b", 3).await;

        assert_eq!(a.generate().await.unwrap(), 0);
        b.release(0).await.unwrap();

        let c = generator(&server, "c", 3).await;
        assert_eq!(c.generate().await.unwrap(), 1);
    }
}
