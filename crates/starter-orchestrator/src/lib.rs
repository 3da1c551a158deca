//! Typed fuzzer-pod spec builder and the orchestrator client trait the
//! starter drives it through.
//!
//! [`PodSpecBuilder`] composes a [`spec::PodTemplate`] via direct field and
//! method access instead of a dynamically-keyed template. [`Orchestrator`]
//! is the trait the pod event processor, displacement planner, and
//! run-fuzzer handler all depend on; [`FakeOrchestrator`] is the in-memory
//! double used in tests.

mod error;
mod fake;
mod labels;
mod object;
mod spec;
mod trait_def;

pub use error::OrchestratorError;
pub use fake::FakeOrchestrator;
pub use labels::{fuzzer_pod_from_object, parse_bondifuzz_labels, MissingLabelError};
pub use object::{
    ContainerState, FuzzerPodStateChecker, NotTerminatedError, PodObject, PodStatusSnapshot, PodWatchEvent,
    WatchEventKind,
};
pub use spec::{bondifuzz_key, ContainerSpec, EnvVar, PodSpecBuilder, PodTemplate, ResourceQuantities,
    ResourceRequirements, Toleration};
pub use trait_def::{CreatePodRequest, Orchestrator, PodEventStream};
