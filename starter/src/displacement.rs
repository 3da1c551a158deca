//! Picks running `fuzzing`-mode pods to evict when a pool has no free
//! capacity for a higher-priority `firstrun` launch.

use std::collections::HashMap;
use std::sync::Arc;

use starter_orchestrator::Orchestrator;
use starter_pod::{AgentMode, FuzzerPod, PodPhase, PodRegistry};
use tracing::{debug, warn};

/// Pods in `pool_id`, running, in fuzzing mode, ranked ascending by how
/// many instances of the same `(fuzzer_id, fuzzer_rev)` are already
/// running and then by start time — the least-replicated, oldest pod goes
/// first so displacement doesn't wipe out a fuzzer's only instance while a
/// heavily-replicated one keeps running.
pub fn select_pods_for_displacement(pods: &PodRegistry, pool_id: &str) -> Vec<FuzzerPod> {
    let suitable: Vec<&FuzzerPod> = pods
        .list_pods()
        .filter(|p| p.pool_id() == pool_id && p.suitcase.agent_mode == AgentMode::Fuzzing && p.phase == PodPhase::Running)
        .collect();

    let mut instance_counts: HashMap<(&str, &str), i64> = HashMap::new();
    for pod in &suitable {
        *instance_counts.entry(pod.instance_key()).or_insert(0) += 1;
    }

    let mut ranked = suitable;
    ranked.sort_by_key(|p| (instance_counts[&p.instance_key()], p.start_time));
    ranked.into_iter().cloned().collect()
}

/// Greedily accumulates victims until both deficits are covered, then
/// evicts all of them together. If the ranked list runs out before both
/// deficits are satisfied, nothing is displaced — a partial eviction that
/// still leaves the launch unable to fit would just waste running work.
pub async fn try_displace_pods(
    pod_registry: &std::sync::Mutex<PodRegistry>,
    orchestrator: &Arc<dyn Orchestrator>,
    pool_id: &str,
    mut cpu_required: i64,
    mut ram_required: i64,
) {
    let candidates = {
        let registry = pod_registry.lock().unwrap();
        select_pods_for_displacement(&registry, pool_id)
    };

    let mut victims = Vec::new();
    let mut displacement_needed = false;

    for pod in candidates {
        victims.push(pod.name.clone());
        cpu_required -= pod.cpu_m;
        ram_required -= pod.ram_mi;

        if cpu_required <= 0 && ram_required <= 0 {
            displacement_needed = true;
            break;
        }
    }

    if !displacement_needed {
        debug!(pool = %pool_id, candidates = victims.len(), "not enough displaceable pods to free required resources");
        return;
    }

    let mut marked = Vec::new();
    {
        let mut registry = pod_registry.lock().unwrap();
        for name in victims {
            match registry.displace_pod(&name) {
                Ok(()) => marked.push(name),
                Err(e) => warn!(pod = %name, error = %e, "failed to mark pod displaced"),
            }
        }
    }

    let results = futures::future::join_all(
        marked.iter().map(|name| orchestrator.displace_fuzzer_pod(name)),
    )
    .await;

    for (name, result) in marked.iter().zip(results) {
        if let Err(e) = result {
            warn!(pod = %name, error = %e, "failed to notify orchestrator of displacement");
        }
    }
}
