use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::OrchestratorError;
use crate::object::{PodObject, PodWatchEvent};

/// Everything needed to compose and create one fuzzer pod, grouped into a
/// struct instead of threaded through as positional arguments the way
/// `KubernetesClient::create_fuzzer_pod` takes them.
#[derive(Debug, Clone)]
pub struct CreatePodRequest {
    pub user_id: String,
    pub project_id: String,
    pub pool_id: String,
    pub fuzzer_id: String,
    pub fuzzer_rev: String,
    pub agent_mode: String,
    pub fuzzer_lang: String,
    pub fuzzer_engine: String,
    pub session_id: String,
    pub agent_image: String,
    pub sandbox_image: String,
    pub agent_cpu_m: i64,
    pub agent_ram_mi: i64,
    pub sandbox_cpu_m: i64,
    pub sandbox_ram_mi: i64,
    pub tmpfs_size_mi: i64,
}

pub type PodEventStream = Pin<Box<dyn Stream<Item = Result<PodWatchEvent, OrchestratorError>> + Send>>;

/// The orchestrator operations the starter needs: create/delete/patch a
/// pod, list the ones that already exist, read its container logs, and
/// watch for state changes.
#[async_trait]
pub trait Orchestrator: Send + Sync {
    async fn create_fuzzer_pod(&self, req: CreatePodRequest) -> Result<PodObject, OrchestratorError>;

    async fn delete_fuzzer_pod(&self, name: &str) -> Result<(), OrchestratorError>;

    /// Label the pod as displaced without deleting it; the pod event
    /// processor deletes it once it has run for the configured minimum
    /// work time.
    async fn displace_fuzzer_pod(&self, name: &str) -> Result<(), OrchestratorError>;

    async fn delete_fuzzer_pods(
        &self,
        fuzzer_id: Option<&str>,
        pool_id: Option<&str>,
    ) -> Result<(), OrchestratorError>;

    async fn list_fuzzer_pods(&self) -> Result<Vec<PodObject>, OrchestratorError>;

    /// `Ok(None)` means the log is currently inaccessible or the pod is
    /// gone (k8s 400/404); only a genuinely unexpected failure returns
    /// `Err`.
    async fn read_pod_log(&self, pod_name: &str, container_name: &str) -> Result<Option<String>, OrchestratorError>;

    fn watch_pod_events(&self) -> PodEventStream;
}
