//! Reconnecting event-stream consumers for pod watch events and pool
//! lifecycle events. Both loops share one reconnect policy: a cancelled
//! stream breaks the loop, a timeout reconnects immediately, and any other
//! error reconnects after a fixed delay so a flapping upstream doesn't spin
//! the loop hot.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use starter_orchestrator::Orchestrator;
use starter_poolclient::{PoolClientError, PoolManagerClient};
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pod_events::PodEventProcessor;
use crate::pool_events::PoolEventProcessor;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// What to do once the inner select loop breaks: stop entirely, reconnect
/// right away (a watch timeout, not a failure), or reconnect after
/// [`RECONNECT_DELAY`] (a genuine error, to avoid spinning on a flapping
/// upstream).
#[derive(Clone, Copy, PartialEq, Eq)]
enum Reconnect {
    No,
    Immediate,
    Delayed,
}

/// Watches `orchestrator.watch_pod_events()`, serializing dispatch through
/// a lock so handler runs never overlap even across reconnects.
pub struct PodEventListener {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PodEventListener {
    pub fn start(orchestrator: Arc<dyn Orchestrator>, processor: Arc<PodEventProcessor>) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let dispatch_lock = Arc::new(AsyncMutex::new(()));

        let task = tokio::spawn(async move {
            info!("pod event listener is running");
            loop {
                if task_cancel.is_cancelled() {
                    break;
                }

                let mut stream = orchestrator.watch_pod_events();
                let mut reconnect = Reconnect::No;

                loop {
                    tokio::select! {
                        _ = task_cancel.cancelled() => {
                            reconnect = Reconnect::No;
                            break;
                        }
                        next = stream.next() => {
                            match next {
                                Some(Ok(event)) => {
                                    let _guard = dispatch_lock.lock().await;
                                    processor.handle(event.kind, &event.pod).await;
                                }
                                Some(Err(e)) => {
                                    error!(error = %e, "unhandled error in pod event listener");
                                    reconnect = Reconnect::Delayed;
                                    break;
                                }
                                None => {
                                    // stream exhausted (watch timeout): reconnect immediately
                                    reconnect = Reconnect::Immediate;
                                    break;
                                }
                            }
                        }
                    }
                }

                if task_cancel.is_cancelled() {
                    break;
                }
                if reconnect == Reconnect::Delayed {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        });

        Self { cancel, task: Some(task) }
    }

    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Watches `PoolManagerClient::pool_event_stream()` with the same
/// cancel/timeout/backoff policy as [`PodEventListener`].
pub struct PoolEventListener {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PoolEventListener {
    pub fn start(client: Arc<PoolManagerClient>, processor: Arc<PoolEventProcessor>) -> Self {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let task = tokio::spawn(async move {
            info!("pool event listener is running");
            loop {
                if task_cancel.is_cancelled() {
                    break;
                }

                let mut stream = client.pool_event_stream();
                let mut reconnect = Reconnect::No;

                loop {
                    tokio::select! {
                        _ = task_cancel.cancelled() => {
                            reconnect = Reconnect::No;
                            break;
                        }
                        next = stream.next() => {
                            match next {
                                Some(Ok(event)) => processor.handle(event).await,
                                Some(Err(PoolClientError::Request(e))) if e.is_timeout() => {
                                    reconnect = Reconnect::Immediate;
                                    break;
                                }
                                Some(Err(e)) => {
                                    error!(error = %e, "unhandled error in pool event listener");
                                    reconnect = Reconnect::Delayed;
                                    break;
                                }
                                None => {
                                    reconnect = Reconnect::Immediate;
                                    break;
                                }
                            }
                        }
                    }
                }

                if task_cancel.is_cancelled() {
                    break;
                }
                if reconnect == Reconnect::Delayed {
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            }
        });

        Self { cancel, task: Some(task) }
    }

    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}
