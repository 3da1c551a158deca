use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("pod '{0}' not found")]
    PodNotFound(String),
    #[error("pod log for '{0}'/'{1}' is inaccessible")]
    LogInaccessible(String, String),
    #[error("orchestrator api error: {0}")]
    Api(String),
}
