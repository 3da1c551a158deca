use std::collections::HashMap;

use chrono::{DateTime, Utc};
use starter_pod::{ContainerExitInfo, PodPhase};

use crate::spec::Toleration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerState {
    Waiting,
    Running,
    Terminated(ContainerExitInfo),
}

impl ContainerState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, ContainerState::Terminated(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodStatusSnapshot {
    pub phase: PodPhase,
    pub start_time: Option<DateTime<Utc>>,
    pub deletion_timestamp: Option<DateTime<Utc>>,
    pub agent_state: ContainerState,
    pub sandbox_state: ContainerState,
    pub cpu_m: i64,
    pub ram_mi: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodObject {
    pub name: String,
    pub labels: HashMap<String, String>,
    /// Node selector and toleration the pod was scheduled with, as composed
    /// from its [`crate::spec::PodTemplate`]. Empty for pods rehydrated from
    /// label data alone, which doesn't carry either back.
    pub node_selector: HashMap<String, String>,
    pub tolerations: Vec<Toleration>,
    pub status: PodStatusSnapshot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodWatchEvent {
    pub kind: WatchEventKind,
    pub pod: PodObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("container is not terminated")]
pub struct NotTerminatedError;

/// Inspects a pod's two container states. Unlike the implementation this is
/// grounded on, `is_sandbox_terminated` genuinely reads the sandbox state.
pub struct FuzzerPodStateChecker<'a> {
    status: &'a PodStatusSnapshot,
}

impl<'a> FuzzerPodStateChecker<'a> {
    pub fn new(status: &'a PodStatusSnapshot) -> Self {
        Self { status }
    }

    fn termination_info(state: &ContainerState) -> Result<ContainerExitInfo, NotTerminatedError> {
        match state {
            ContainerState::Terminated(info) => Ok(info.clone()),
            _ => Err(NotTerminatedError),
        }
    }

    pub fn is_agent_terminated(&self) -> bool {
        self.status.agent_state.is_terminated()
    }

    pub fn is_sandbox_terminated(&self) -> bool {
        self.status.sandbox_state.is_terminated()
    }

    pub fn agent_termination_info(&self) -> Result<ContainerExitInfo, NotTerminatedError> {
        Self::termination_info(&self.status.agent_state)
    }

    pub fn sandbox_termination_info(&self) -> Result<ContainerExitInfo, NotTerminatedError> {
        Self::termination_info(&self.status.sandbox_state)
    }
}
