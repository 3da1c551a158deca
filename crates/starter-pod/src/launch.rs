use chrono::{DateTime, Duration, Utc};

use crate::pod::Suitcase;

/// Termination facts extracted from a pod's terminated container state,
/// independent of whether the agent or sandbox container produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerExitInfo {
    pub start_time: DateTime<Utc>,
    pub finish_time: DateTime<Utc>,
    pub exit_code: i32,
    pub reason: String,
}

/// A persisted fuzzer launch, written once a pod's outcome is known and
/// swept from the store once `exp_date` passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRecord {
    pub id: Option<String>,
    pub exp_date: DateTime<Utc>,

    pub fuzzer_id: String,
    pub fuzzer_rev: String,
    pub fuzzer_engine: String,
    pub agent_mode: String,
    pub fuzzer_lang: String,
    pub session_id: String,
    pub project_id: String,
    pub user_id: String,

    pub start_time: DateTime<Utc>,
    pub finish_time: DateTime<Utc>,
    pub exit_reason: String,
    pub agent_logs: Option<String>,
    pub sandbox_logs: Option<String>,
}

impl LaunchRecord {
    pub fn from_exit(
        suitcase: &Suitcase,
        term_info: &ContainerExitInfo,
        agent_logs: Option<String>,
        sandbox_logs: Option<String>,
        retention_seconds: i64,
    ) -> Self {
        Self {
            id: None,
            exp_date: term_info.start_time + Duration::seconds(retention_seconds),
            fuzzer_id: suitcase.fuzzer_id.clone(),
            fuzzer_rev: suitcase.fuzzer_rev.clone(),
            fuzzer_engine: suitcase.fuzzer_engine.clone(),
            agent_mode: suitcase.agent_mode.as_str().to_string(),
            fuzzer_lang: suitcase.fuzzer_lang.clone(),
            session_id: suitcase.session_id.clone(),
            project_id: suitcase.project_id.clone(),
            user_id: suitcase.user_id.clone(),
            start_time: term_info.start_time,
            finish_time: term_info.finish_time,
            exit_reason: term_info.reason.clone(),
            agent_logs,
            sandbox_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pod::AgentMode;
    use pretty_assertions::assert_eq;

    fn suitcase() -> Suitcase {
        Suitcase {
            user_id: "u".to_string(),
            project_id: "p".to_string(),
            pool_id: "pool".to_string(),
            fuzzer_id: "f".to_string(),
            fuzzer_rev: "r".to_string(),
            agent_mode: AgentMode::Fuzzing,
            fuzzer_lang: "c".to_string(),
            fuzzer_engine: "libfuzzer".to_string(),
            session_id: "s".to_string(),
        }
    }

    #[test]
    fn exp_date_is_start_time_plus_retention() {
        let start = DateTime::parse_from_rfc3339("2026-08-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let term = ContainerExitInfo {
            start_time: start,
            finish_time: start + Duration::seconds(60),
            exit_code: 0,
            reason: "Completed".to_string(),
        };
        let record = LaunchRecord::from_exit(&suitcase(), &term, None, None, 3600);
        assert_eq!(record.exp_date, start + Duration::seconds(3600));
    }
}
