use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::broadcast;

use crate::error::OrchestratorError;
use crate::object::{PodObject, PodStatusSnapshot, PodWatchEvent, WatchEventKind};
use crate::spec::{bondifuzz_key, build_fuzzer_pod_template};
use crate::trait_def::{CreatePodRequest, Orchestrator, PodEventStream};

/// In-memory [`Orchestrator`] double used by integration tests. Pods live
/// in a `HashMap` and every mutation also broadcasts the matching watch
/// event, mirroring how a real watch stream mirrors the object store.
pub struct FakeOrchestrator {
    pods: Mutex<HashMap<String, PodObject>>,
    events: broadcast::Sender<PodWatchEvent>,
}

impl FakeOrchestrator {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            pods: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn emit(&self, kind: WatchEventKind, pod: PodObject) {
        let _ = self.events.send(PodWatchEvent { kind, pod });
    }

    /// Test hook: push an externally-driven status transition for a pod
    /// already known to the fake, as if the orchestrator reported it.
    pub fn set_status(&self, name: &str, status: PodStatusSnapshot) {
        let mut pods = self.pods.lock().unwrap();
        if let Some(pod) = pods.get_mut(name) {
            pod.status = status;
            self.emit(WatchEventKind::Modified, pod.clone());
        }
    }
}

impl Default for FakeOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Orchestrator for FakeOrchestrator {
    async fn create_fuzzer_pod(&self, req: CreatePodRequest) -> Result<PodObject, OrchestratorError> {
        let name = format!("fuzzer-{}-{}", req.fuzzer_id, uuid_like(&req.session_id));
        let template = build_fuzzer_pod_template(&req);

        let pod = PodObject {
            name: name.clone(),
            labels: template.labels,
            node_selector: template.node_selector,
            tolerations: template.tolerations,
            status: PodStatusSnapshot {
                phase: starter_pod::PodPhase::Pending,
                start_time: None,
                deletion_timestamp: None,
                agent_state: crate::object::ContainerState::Waiting,
                sandbox_state: crate::object::ContainerState::Waiting,
                cpu_m: template.agent.resources.requests.cpu_m + template.sandbox.resources.requests.cpu_m,
                ram_mi: template.agent.resources.requests.ram_mi + template.sandbox.resources.requests.ram_mi,
            },
        };

        self.pods.lock().unwrap().insert(name, pod.clone());
        self.emit(WatchEventKind::Added, pod.clone());
        Ok(pod)
    }

    async fn delete_fuzzer_pod(&self, name: &str) -> Result<(), OrchestratorError> {
        let pod = self
            .pods
            .lock()
            .unwrap()
            .remove(name)
            .ok_or_else(|| OrchestratorError::PodNotFound(name.to_string()))?;
        self.emit(WatchEventKind::Deleted, pod);
        Ok(())
    }

    async fn displace_fuzzer_pod(&self, name: &str) -> Result<(), OrchestratorError> {
        let mut pods = self.pods.lock().unwrap();
        let pod = pods
            .get_mut(name)
            .ok_or_else(|| OrchestratorError::PodNotFound(name.to_string()))?;
        pod.labels.insert(bondifuzz_key("displaced_at"), String::new());
        let snapshot = pod.clone();
        drop(pods);
        self.emit(WatchEventKind::Modified, snapshot);
        Ok(())
    }

    async fn delete_fuzzer_pods(
        &self,
        fuzzer_id: Option<&str>,
        pool_id: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        let matches: Vec<String> = {
            let pods = self.pods.lock().unwrap();
            pods.values()
                .filter(|p| {
                    fuzzer_id
                        .map(|id| p.labels.get(&bondifuzz_key("fuzzer_id")).map(String::as_str) == Some(id))
                        .unwrap_or(true)
                        && pool_id
                            .map(|id| p.labels.get(&bondifuzz_key("pool_id")).map(String::as_str) == Some(id))
                            .unwrap_or(true)
                })
                .map(|p| p.name.clone())
                .collect()
        };

        for name in matches {
            self.delete_fuzzer_pod(&name).await?;
        }
        Ok(())
    }

    async fn list_fuzzer_pods(&self) -> Result<Vec<PodObject>, OrchestratorError> {
        Ok(self.pods.lock().unwrap().values().cloned().collect())
    }

    async fn read_pod_log(&self, pod_name: &str, container_name: &str) -> Result<Option<String>, OrchestratorError> {
        if self.pods.lock().unwrap().contains_key(pod_name) {
            Ok(Some(format!("fake log for {pod_name}/{container_name}")))
        } else {
            Ok(None)
        }
    }

    fn watch_pod_events(&self) -> PodEventStream {
        let rx = self.events.subscribe();
        Box::pin(stream::unfold(rx, |mut rx| async move {
            match rx.recv().await {
                Ok(event) => Some((Ok(event), rx)),
                Err(broadcast::error::RecvError::Closed) => None,
                Err(broadcast::error::RecvError::Lagged(_)) => {
                    Some((Err(OrchestratorError::Api("watch stream lagged".to_string())), rx))
                }
            }
        }))
    }
}

fn uuid_like(seed: &str) -> String {
    seed.chars().rev().collect()
}
