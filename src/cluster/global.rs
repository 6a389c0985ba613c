//! Process-wide instance context, installed once at startup

use once_cell::sync::Lazy;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use super::context::InstanceContext;
use super::context_manager::ContextManager;
use super::error::{ClusterError, ClusterResult};

static INSTANCE_CONTEXT: Lazy<RwLock<Option<Arc<InstanceContext>>>> =
    Lazy::new(|| RwLock::new(None));

/// Install the node's instance context; fails if one is installed already
pub fn install(context: Arc<InstanceContext>) -> ClusterResult<()> {
    let mut slot = INSTANCE_CONTEXT
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if slot.is_some() {
        return Err(ClusterError::AlreadyInitialized);
    }
    debug!("Installed instance context {}", context.id());
    *slot = Some(context);
    Ok(())
}

pub fn current() -> Option<Arc<InstanceContext>> {
    INSTANCE_CONTEXT
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

/// Install the context of a freshly built node.
///
/// When another context is installed already the node leaves the cluster
/// again before the error is returned.
pub async fn install_manager(manager: &ContextManager) -> ClusterResult<()> {
    if let Err(e) = install(manager.instance_context().clone()) {
        if let Err(stop) = manager.shutdown().await {
            warn!("Shutdown after failed install incomplete: {}", stop);
        }
        return Err(e);
    }
    Ok(())
}

/// Remove the installed context, returning it
pub fn teardown() -> Option<Arc<InstanceContext>> {
    INSTANCE_CONTEXT
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::event::EventBusContext;
    use crate::cluster::instance::{InstanceMetaData, InstanceType};
    use crate::cluster::lock::GlobalLockContext;
    use crate::registry::{ClusterRepository, MemoryRegistry};
    use std::time::Duration;

    #[tokio::test]
    async fn test_install_once_then_teardown() {
        let repository: Arc<dyn ClusterRepository> = Arc::new(
            MemoryRegistry::new("global-install")
                .connect(Duration::from_secs(30))
                .await
                .unwrap(),
        );
        let context = Arc::new(InstanceContext::new(
            InstanceMetaData {
                id: "n1".to_string(),
                instance_type: InstanceType::Proxy,
                host: "localhost".to_string(),
                port: 3307,
                version: "test".to_string(),
            },
            0,
            vec![],
            Arc::new(GlobalLockContext::new(
                repository,
                Duration::from_millis(10),
                Duration::from_secs(1),
            )),
            EventBusContext::new(),
        ));

        install(context.clone()).unwrap();
        assert!(matches!(
            install(context.clone()),
            Err(ClusterError::AlreadyInitialized)
        ));
        assert_eq!(current().map(|c| c.id().to_string()), Some("n1".to_string()));

        assert!(teardown().is_some());
        assert!(current().is_none());
        assert!(teardown().is_none());
    }
}
