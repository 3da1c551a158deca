//! Fuzzer pod inventory, displacement bookkeeping, and launch records.
//!
//! [`FuzzerPod`] mirrors what the orchestrator reports about a pod plus the
//! request-time [`Suitcase`] metadata stamped onto it as labels.
//! [`PodRegistry`] is the `pod_name -> FuzzerPod` store the pod event
//! processor and displacement planner both operate on.

mod launch;
mod output;
mod pod;
mod registry;

pub use launch::{ContainerExitInfo, LaunchRecord};
pub use output::PodOutputSaveMode;
pub use pod::{AgentMode, FuzzerPod, PodPhase, Suitcase};
pub use registry::{PodRegistry, PodRegistryError};
