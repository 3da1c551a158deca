use std::collections::HashMap;

use starter_pod::{AgentMode, FuzzerPod, Suitcase};
use thiserror::Error;

use crate::object::PodObject;

const LABEL_PREFIX: &str = "bondifuzz/";

/// Strips the `bondifuzz/` prefix and un-hyphenates keys, the inverse of
/// `spec::bondifuzz_key`.
pub fn parse_bondifuzz_labels(raw: &HashMap<String, String>) -> HashMap<String, String> {
    raw.iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(LABEL_PREFIX)
                .map(|rest| (rest.replace('-', "_"), v.clone()))
        })
        .collect()
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("pod '{pod_name}' is missing label '{label}'")]
pub struct MissingLabelError {
    pub pod_name: String,
    pub label: String,
}

fn required<'a>(
    labels: &'a HashMap<String, String>,
    pod_name: &str,
    key: &str,
) -> Result<&'a str, MissingLabelError> {
    labels
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| MissingLabelError {
            pod_name: pod_name.to_string(),
            label: key.to_string(),
        })
}

/// Rehydrates a [`FuzzerPod`] from an orchestrator-reported pod object,
/// reading its suitcase back out of `bondifuzz/*` labels. Used to rebuild
/// the pod registry on startup from whatever pods already exist.
pub fn fuzzer_pod_from_object(pod: &PodObject) -> Result<FuzzerPod, MissingLabelError> {
    let labels = parse_bondifuzz_labels(&pod.labels);

    let suitcase = Suitcase {
        user_id: required(&labels, &pod.name, "user_id")?.to_string(),
        project_id: required(&labels, &pod.name, "project_id")?.to_string(),
        pool_id: required(&labels, &pod.name, "pool_id")?.to_string(),
        fuzzer_id: required(&labels, &pod.name, "fuzzer_id")?.to_string(),
        fuzzer_rev: required(&labels, &pod.name, "fuzzer_rev")?.to_string(),
        agent_mode: AgentMode::from(required(&labels, &pod.name, "agent_mode")?),
        fuzzer_lang: required(&labels, &pod.name, "fuzzer_lang")?.to_string(),
        fuzzer_engine: required(&labels, &pod.name, "fuzzer_engine")?.to_string(),
        session_id: required(&labels, &pod.name, "session_id")?.to_string(),
    };

    Ok(FuzzerPod {
        name: pod.name.clone(),
        phase: pod.status.phase,
        start_time: pod.status.start_time,
        displaced: labels.contains_key("displaced_at"),
        deleting: false,
        cpu_m: pod.status.cpu_m,
        ram_mi: pod.status.ram_mi,
        suitcase,
        agent_logs: None,
        sandbox_logs: None,
        logs_saved: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ContainerState, PodStatusSnapshot};
    use pretty_assertions::assert_eq;
    use starter_pod::PodPhase;

    fn object_with_labels(labels: HashMap<String, String>) -> PodObject {
        PodObject {
            name: "pod-1".to_string(),
            labels,
            node_selector: HashMap::new(),
            tolerations: Vec::new(),
            status: PodStatusSnapshot {
                phase: PodPhase::Running,
                start_time: None,
                deletion_timestamp: None,
                agent_state: ContainerState::Running,
                sandbox_state: ContainerState::Running,
                cpu_m: 500,
                ram_mi: 1024,
            },
        }
    }

    fn full_labels() -> HashMap<String, String> {
        [
            ("bondifuzz/user-id", "u"),
            ("bondifuzz/project-id", "p"),
            ("bondifuzz/pool-id", "pool"),
            ("bondifuzz/fuzzer-id", "f"),
            ("bondifuzz/fuzzer-rev", "r"),
            ("bondifuzz/agent-mode", "fuzzing"),
            ("bondifuzz/fuzzer-lang", "c"),
            ("bondifuzz/fuzzer-engine", "libfuzzer"),
            ("bondifuzz/session-id", "s"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn rehydrates_full_suitcase_from_labels() {
        let pod = fuzzer_pod_from_object(&object_with_labels(full_labels())).unwrap();
        assert_eq!(pod.suitcase.pool_id, "pool");
        assert_eq!(pod.suitcase.agent_mode.as_str(), "fuzzing");
        assert!(!pod.displaced);
    }

    #[test]
    fn missing_label_is_an_error() {
        let mut labels = full_labels();
        labels.remove("bondifuzz/pool-id");
        assert_eq!(
            fuzzer_pod_from_object(&object_with_labels(labels)),
            Err(MissingLabelError {
                pod_name: "pod-1".to_string(),
                label: "pool_id".to_string(),
            })
        );
    }

    #[test]
    fn displaced_at_label_marks_pod_displaced() {
        let mut labels = full_labels();
        labels.insert("bondifuzz/displaced-at".to_string(), String::new());
        let pod = fuzzer_pod_from_object(&object_with_labels(labels)).unwrap();
        assert!(pod.displaced);
    }
}
