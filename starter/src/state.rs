use std::sync::{Arc, Mutex};

use starter_mq::Mq;
use starter_orchestrator::Orchestrator;
use starter_pod::PodRegistry;
use starter_pool::PoolRegistry;
use starter_store::LaunchStore;

use crate::config::Config;

/// Shared service state: the two in-memory registries behind plain mutexes
/// (every registry method is synchronous and held only across a handful of
/// field writes, never across an `.await`), shared via `Arc` so the event
/// processors can hold the same registries the HTTP handlers see, plus the
/// three external-system clients as trait objects.
pub struct AppState {
    pub pool_registry: Arc<Mutex<PoolRegistry>>,
    pub pod_registry: Arc<Mutex<PodRegistry>>,
    pub orchestrator: Arc<dyn Orchestrator>,
    pub mq: Arc<dyn Mq>,
    pub store: Arc<dyn LaunchStore>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        mq: Arc<dyn Mq>,
        store: Arc<dyn LaunchStore>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            pool_registry: Arc::new(Mutex::new(PoolRegistry::new())),
            pod_registry: Arc::new(Mutex::new(PodRegistry::new())),
            orchestrator,
            mq,
            store,
            config,
        }
    }
}
