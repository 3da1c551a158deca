use serde::{Deserialize, Serialize};

use starter_pod::Suitcase;

/// Published to `starter.pods.finished` once a fuzzer pod's outcome is
/// known, matching `MP_PodFinished.Model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodFinishedMessage {
    pub user_id: String,
    pub project_id: String,
    pub pool_id: String,
    pub fuzzer_id: String,
    pub fuzzer_rev: String,
    pub agent_mode: String,
    pub fuzzer_lang: String,
    pub fuzzer_engine: String,
    pub session_id: String,
    pub success: bool,
}

impl PodFinishedMessage {
    pub fn from_suitcase(suitcase: &Suitcase, success: bool) -> Self {
        Self {
            user_id: suitcase.user_id.clone(),
            project_id: suitcase.project_id.clone(),
            pool_id: suitcase.pool_id.clone(),
            fuzzer_id: suitcase.fuzzer_id.clone(),
            fuzzer_rev: suitcase.fuzzer_rev.clone(),
            agent_mode: suitcase.agent_mode.as_str().to_string(),
            fuzzer_lang: suitcase.fuzzer_lang.clone(),
            fuzzer_engine: suitcase.fuzzer_engine.clone(),
            session_id: suitcase.session_id.clone(),
            success,
        }
    }
}

pub const QUEUE_NAME: &str = "starter.pods.finished";
