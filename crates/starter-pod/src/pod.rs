use chrono::{DateTime, Utc};

/// Phase reported by the orchestrator for a pod. Closed set, matching the
/// values the container runtime actually emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl PodPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, PodPhase::Succeeded | PodPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PodPhase::Pending => "Pending",
            PodPhase::Running => "Running",
            PodPhase::Succeeded => "Succeeded",
            PodPhase::Failed => "Failed",
            PodPhase::Unknown => "Unknown",
        }
    }
}

impl std::str::FromStr for PodPhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(PodPhase::Pending),
            "Running" => Ok(PodPhase::Running),
            "Succeeded" => Ok(PodPhase::Succeeded),
            "Failed" => Ok(PodPhase::Failed),
            "Unknown" => Ok(PodPhase::Unknown),
            other => Err(format!("unrecognized pod phase '{other}'")),
        }
    }
}

impl std::fmt::Display for PodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode the agent container was launched in. `fuzzing` is the only mode the
/// displacement planner cares about; everything else passes through
/// untouched so an unrecognized future mode is not silently misclassified.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AgentMode {
    FirstRun,
    Fuzzing,
    Other(String),
}

impl AgentMode {
    pub fn is_fuzzing(&self) -> bool {
        matches!(self, AgentMode::Fuzzing)
    }

    pub fn as_str(&self) -> &str {
        match self {
            AgentMode::FirstRun => "firstrun",
            AgentMode::Fuzzing => "fuzzing",
            AgentMode::Other(s) => s,
        }
    }
}

impl From<&str> for AgentMode {
    fn from(s: &str) -> Self {
        match s {
            "firstrun" => AgentMode::FirstRun,
            "fuzzing" => AgentMode::Fuzzing,
            other => AgentMode::Other(other.to_string()),
        }
    }
}

impl From<String> for AgentMode {
    fn from(s: String) -> Self {
        AgentMode::from(s.as_str())
    }
}

/// The "suitcase" of request-time metadata a pod carries for its whole
/// lifetime, stamped onto it as `bondifuzz/*` labels at creation and read
/// back out of them on registry rehydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suitcase {
    pub user_id: String,
    pub project_id: String,
    pub pool_id: String,
    pub fuzzer_id: String,
    pub fuzzer_rev: String,
    pub agent_mode: AgentMode,
    pub fuzzer_lang: String,
    pub fuzzer_engine: String,
    pub session_id: String,
}

/// One fuzzer pod tracked by the starter, combining orchestrator-reported
/// state with the suitcase metadata needed to account for and report on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuzzerPod {
    pub name: String,
    pub phase: PodPhase,
    pub start_time: Option<DateTime<Utc>>,
    pub displaced: bool,
    pub deleting: bool,
    pub cpu_m: i64,
    pub ram_mi: i64,

    pub suitcase: Suitcase,

    pub agent_logs: Option<String>,
    pub sandbox_logs: Option<String>,
    pub logs_saved: bool,
}

impl FuzzerPod {
    pub fn pool_id(&self) -> &str {
        &self.suitcase.pool_id
    }

    pub fn instance_key(&self) -> (&str, &str) {
        (&self.suitcase.fuzzer_id, &self.suitcase.fuzzer_rev)
    }
}
