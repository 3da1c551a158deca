//! Ordered startup and shutdown sequencing: every step below gates the
//! next at startup, and shutdown runs the reverse order best-effort so a
//! failure partway through still tears down everything that came up.

use std::sync::Arc;

use futures::StreamExt;
use starter_mq::{FakeMq, Mq};
use starter_orchestrator::fuzzer_pod_from_object;
use starter_pool::PoolRegistry;
use starter_poolclient::PoolManagerClient;
use starter_store::LaunchStore;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::listeners::{PodEventListener, PoolEventListener};
use crate::pod_events::PodEventProcessor;
use crate::pool_events::PoolEventProcessor;
use crate::state::AppState;

/// Rehydrates the pool registry from the pool manager's pool listing,
/// locking any pool with an in-flight operation.
async fn init_pool_registry(state: &AppState, pool_client: &PoolManagerClient) -> anyhow::Result<()> {
    let mut stream = pool_client.list_pools();
    let mut registry = PoolRegistry::new();

    while let Some(pool) = stream.next().await {
        let pool = pool?;
        registry.create_pool(pool.id.clone(), pool.is_locked())?;
        for node in &pool.rs_avail.nodes {
            registry.add_node(&pool.id, node.name.clone(), node.cpu, node.ram)?;
        }
    }

    *state.pool_registry.lock().unwrap() = registry;
    info!("pool registry rehydrated");
    Ok(())
}

/// Rehydrates the pod registry from whatever fuzzer pods the orchestrator
/// already reports running, so a restart doesn't lose track of them.
async fn init_pod_registry(state: &AppState) -> anyhow::Result<()> {
    let pods = state.orchestrator.list_fuzzer_pods().await?;
    let mut registry = starter_pod::PodRegistry::new();

    for pod in &pods {
        match fuzzer_pod_from_object(pod) {
            Ok(fuzzer_pod) => {
                if let Err(e) = registry.add_pod(fuzzer_pod) {
                    warn!(pod = %pod.name, error = %e, "skipping duplicate pod during rehydration");
                }
            }
            Err(e) => warn!(pod = %pod.name, error = %e, "skipping pod with incomplete suitcase labels"),
        }
    }

    *state.pod_registry.lock().unwrap() = registry;
    info!(pods = pods.len(), "pod registry rehydrated");
    Ok(())
}

/// Periodically sweeps launch records past their retention period. Runs
/// until `cancel` fires.
fn spawn_launch_retention_task(
    store: Arc<dyn LaunchStore>,
    cleanup_interval: std::time::Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(cleanup_interval) => {
                    match store.remove_expired(chrono::Utc::now()).await {
                        Ok(removed) if removed > 0 => info!(removed, "swept expired launch records"),
                        Ok(_) => {}
                        Err(e) => error!(error = %e, "failed to sweep expired launch records"),
                    }
                }
            }
        }
    })
}

/// Everything that must be torn down in reverse order at shutdown.
pub struct RunningService {
    pod_listener: PodEventListener,
    pool_listener: PoolEventListener,
    retention_task: tokio::task::JoinHandle<()>,
    retention_cancel: CancellationToken,
    mq: Arc<FakeMq>,
}

impl RunningService {
    /// Runs every startup step in order, each gating the next. On any
    /// failure, nothing started so far needs explicit cleanup beyond
    /// dropping the partially-built value.
    pub async fn start(state: Arc<AppState>, pool_client: Arc<PoolManagerClient>, mq: Arc<FakeMq>, config: &Config) -> anyhow::Result<Self> {
        state.orchestrator.list_fuzzer_pods().await?;
        info!("orchestrator permissions verified");

        init_pool_registry(&state, &pool_client).await?;
        init_pod_registry(&state).await?;

        let pool_processor = Arc::new(PoolEventProcessor::new(state.pool_registry.clone(), state.orchestrator.clone()));
        let pool_listener = PoolEventListener::start(pool_client.clone(), pool_processor);

        let pod_processor = Arc::new(PodEventProcessor::new(
            state.pool_registry.clone(),
            state.pod_registry.clone(),
            state.orchestrator.clone(),
            state.mq.clone(),
            state.store.clone(),
            config,
        ));
        let pod_listener = PodEventListener::start(state.orchestrator.clone(), pod_processor);

        let retention_cancel = CancellationToken::new();
        let retention_task = spawn_launch_retention_task(
            state.store.clone(),
            std::time::Duration::from_secs(config.fuzzer_pod.launch_info_cleanup_interval.max(1) as u64),
            retention_cancel.clone(),
        );

        for message in mq.export_unsent() {
            if let Err(e) = mq.publish_pod_finished(message).await {
                error!(error = %e, "failed to republish unsent message on startup");
            }
        }

        info!("startup sequence complete");
        Ok(Self { pod_listener, pool_listener, retention_task, retention_cancel, mq })
    }

    /// Reverse-order, best-effort teardown: every step still runs even if
    /// an earlier one failed, since a partially shut-down process is worse
    /// than a shutdown log full of warnings.
    pub async fn shutdown(mut self) {
        self.retention_cancel.cancel();
        let _ = self.retention_task.await;

        self.pod_listener.close().await;
        self.pool_listener.close().await;

        // Messages still buffered in the outbox (broker was down at some
        // point) are left in place; a real producer would persist them to
        // durable storage here before the process exits.
        let stranded = self.mq.export_unsent();
        if !stranded.is_empty() {
            warn!(count = stranded.len(), "unsent messages remain at shutdown");
            self.mq.import_unsent(stranded);
        }

        info!("shutdown sequence complete");
    }
}

