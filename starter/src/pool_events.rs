//! Dispatches pool lifecycle events from the pool-manager SSE stream onto
//! the pool registry: a pool under construction or teardown is locked and
//! has its fuzzer pods evicted, and node changes adjust its capacity.

use std::sync::Arc;

use starter_orchestrator::Orchestrator;
use starter_pool::PoolRegistry;
use starter_poolclient::PoolEvent;
use tracing::{debug, warn};

pub struct PoolEventProcessor {
    pool_registry: Arc<std::sync::Mutex<PoolRegistry>>,
    orchestrator: Arc<dyn Orchestrator>,
}

impl PoolEventProcessor {
    pub fn new(pool_registry: Arc<std::sync::Mutex<PoolRegistry>>, orchestrator: Arc<dyn Orchestrator>) -> Self {
        Self { pool_registry, orchestrator }
    }

    pub async fn handle(&self, event: PoolEvent) {
        match event {
            PoolEvent::Creating { pool_id } => {
                let mut registry = self.pool_registry.lock().unwrap();
                if let Err(e) = registry.create_pool(&pool_id, true) {
                    warn!(pool = %pool_id, error = %e, "failed to create pool on creating event");
                } else {
                    debug!(pool = %pool_id, "pool creation started");
                }
            }
            PoolEvent::Created { pool_id } => {
                let mut registry = self.pool_registry.lock().unwrap();
                if let Err(e) = registry.unlock_pool(&pool_id) {
                    warn!(pool = %pool_id, error = %e, "failed to unlock pool on created event");
                } else {
                    debug!(pool = %pool_id, "pool creation finished");
                }
            }
            PoolEvent::Updating { pool_id } => {
                self.lock_and_evict(&pool_id).await;
                debug!(pool = %pool_id, "pool update started");
            }
            PoolEvent::Updated { pool_id } => {
                {
                    let mut registry = self.pool_registry.lock().unwrap();
                    if let Err(e) = registry.unlock_pool(&pool_id) {
                        warn!(pool = %pool_id, error = %e, "failed to unlock pool on updated event");
                    }
                }
                if let Err(e) = self.orchestrator.delete_fuzzer_pods(None, Some(&pool_id)).await {
                    warn!(pool = %pool_id, error = %e, "failed to delete fuzzer pods after pool update");
                }
                debug!(pool = %pool_id, "pool update finished");
            }
            PoolEvent::Deleting { pool_id } => {
                self.lock_and_evict(&pool_id).await;
                debug!(pool = %pool_id, "pool deletion started");
            }
            PoolEvent::Deleted { pool_id } => {
                let mut registry = self.pool_registry.lock().unwrap();
                if let Err(e) = registry.remove_pool(&pool_id) {
                    warn!(pool = %pool_id, error = %e, "failed to remove pool on deleted event");
                } else {
                    debug!(pool = %pool_id, "pool deletion finished");
                }
            }
            PoolEvent::NodeAdded { pool_id, node_name, cpu, ram } => {
                let mut registry = self.pool_registry.lock().unwrap();
                if let Err(e) = registry.add_node(&pool_id, &node_name, cpu, ram) {
                    warn!(pool = %pool_id, node = %node_name, error = %e, "failed to add pool node");
                } else {
                    debug!(pool = %pool_id, node = %node_name, "pool node added");
                }
            }
            PoolEvent::NodeRemoved { pool_id, node_name } => {
                let mut registry = self.pool_registry.lock().unwrap();
                if let Err(e) = registry.remove_node(&pool_id, &node_name) {
                    warn!(pool = %pool_id, node = %node_name, error = %e, "failed to remove pool node");
                } else {
                    debug!(pool = %pool_id, node = %node_name, "pool node removed");
                }
            }
        }
    }

    async fn lock_and_evict(&self, pool_id: &str) {
        {
            let mut registry = self.pool_registry.lock().unwrap();
            if let Err(e) = registry.lock_pool(pool_id) {
                warn!(pool = %pool_id, error = %e, "failed to lock pool");
            }
        }
        if let Err(e) = self.orchestrator.delete_fuzzer_pods(None, Some(pool_id)).await {
            warn!(pool = %pool_id, error = %e, "failed to delete fuzzer pods for locked pool");
        }
    }
}
