//! Reacts to orchestrator-reported pod state changes: tracks phase/start
//! time, saves container logs before a graceful-shutdown deletion wipes
//! them, frees pool resources and notifies the scheduler once a pod's
//! outcome is known, and deletes pods that exited or were displaced.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use starter_mq::{Mq, PodFinishedMessage};
use starter_orchestrator::{FuzzerPodStateChecker, Orchestrator, PodObject, WatchEventKind};
use starter_pod::{FuzzerPod, LaunchRecord, PodOutputSaveMode, PodPhase, PodRegistry};
use starter_pool::PoolRegistry;
use starter_store::LaunchStore;
use tracing::{debug, error, info, warn};

use crate::config::Config;

pub struct PodEventProcessor {
    pool_registry: Arc<std::sync::Mutex<PoolRegistry>>,
    pod_registry: Arc<std::sync::Mutex<PodRegistry>>,
    orchestrator: Arc<dyn Orchestrator>,
    mq: Arc<dyn Mq>,
    store: Arc<dyn LaunchStore>,
    output_save_mode: PodOutputSaveMode,
    retention_seconds: i64,
    min_work_time_seconds: i64,
}

impl PodEventProcessor {
    pub fn new(
        pool_registry: Arc<std::sync::Mutex<PoolRegistry>>,
        pod_registry: Arc<std::sync::Mutex<PodRegistry>>,
        orchestrator: Arc<dyn Orchestrator>,
        mq: Arc<dyn Mq>,
        store: Arc<dyn LaunchStore>,
        config: &Config,
    ) -> Self {
        Self {
            pool_registry,
            pod_registry,
            orchestrator,
            mq,
            store,
            output_save_mode: config.fuzzer_pod.output_save_mode,
            retention_seconds: config.fuzzer_pod.launch_info_retention_period,
            min_work_time_seconds: config.fuzzer_pod.min_work_time,
        }
    }

    async fn read_log(&self, pod_name: &str, container_name: &str) -> Option<String> {
        match self.orchestrator.read_pod_log(pod_name, container_name).await {
            Ok(logs) => logs,
            Err(e) => {
                error!(pod = %pod_name, container = %container_name, error = %e, "failed to retrieve pod log");
                None
            }
        }
    }

    async fn save_pod_logs(&self, pod: &mut FuzzerPod) {
        if pod.logs_saved {
            return;
        }
        let (agent_logs, sandbox_logs) =
            tokio::join!(self.read_log(&pod.name, "agent"), self.read_log(&pod.name, "sandbox"));
        pod.agent_logs = agent_logs;
        pod.sandbox_logs = sandbox_logs;
        pod.logs_saved = true;
    }

    async fn delete_pod_safe(&self, pod_name: &str) {
        if let Err(e) = self.orchestrator.delete_fuzzer_pod(pod_name).await {
            error!(pod = %pod_name, error = %e, "failed to delete pod");
        }
    }

    /// Pod has been marked displaced but hasn't run for `min_work_time`
    /// yet: schedule its deletion for when it has, instead of evicting it
    /// immediately and losing partial fuzzing progress.
    async fn delete_displaced_pod(&self, pod: &FuzzerPod) {
        let Some(start_time) = pod.start_time else {
            warn!(pod = %pod.name, "displaced pod has no start time yet, deleting now");
            self.delete_pod_safe(&pod.name).await;
            return;
        };

        let now = Utc::now();
        let min_work_time = Duration::seconds(self.min_work_time_seconds);

        if now > start_time + min_work_time {
            debug!(pod = %pod.name, "displaced pod has run long enough, deleting now");
            self.delete_pod_safe(&pod.name).await;
            return;
        }

        let delay = (min_work_time - (now - start_time)).max(Duration::zero());
        debug!(pod = %pod.name, delay_seconds = delay.num_seconds(), "displaced pod will be deleted after delay");

        let orchestrator = self.orchestrator.clone();
        let pod_name = pod.name.clone();
        tokio::spawn(async move {
            tokio::time::sleep(StdDuration::from_secs(delay.num_seconds().max(0) as u64)).await;
            if let Err(e) = orchestrator.delete_fuzzer_pod(&pod_name).await {
                error!(pod = %pod_name, error = %e, "failed to delete displaced pod after delay");
            }
        });
    }

    async fn notify_fuzzer_pod_finished(&self, pod: &FuzzerPod, success: bool) {
        let message = PodFinishedMessage::from_suitcase(&pod.suitcase, success);
        if let Err(e) = self.mq.publish_pod_finished(message).await {
            error!(pod = %pod.name, error = %e, "failed to publish pod-finished notification");
        }
    }

    async fn save_pod_launch(&self, pod: &FuzzerPod, term_info: &starter_pod::ContainerExitInfo) {
        if !self.output_save_mode.should_save(term_info.exit_code) {
            return;
        }

        let record = LaunchRecord::from_exit(
            &pod.suitcase,
            term_info,
            pod.agent_logs.clone(),
            pod.sandbox_logs.clone(),
            self.retention_seconds,
        );

        if let Err(e) = self.store.save(record).await {
            error!(pod = %pod.name, error = %e, "failed to save launch record");
        }
    }

    fn free_and_remove(&self, pod: &FuzzerPod) {
        let mut pool_registry = self.pool_registry.lock().unwrap();
        if let Err(e) = pool_registry.free(pod.pool_id(), pod.cpu_m, pod.ram_mi) {
            error!(pod = %pod.name, pool = %pod.pool_id(), error = %e, "failed to free pool resources");
        }
        drop(pool_registry);

        let mut pod_registry = self.pod_registry.lock().unwrap();
        if let Err(e) = pod_registry.remove_pod(&pod.name) {
            error!(pod = %pod.name, error = %e, "failed to remove pod from registry");
        }
    }

    async fn handle_fuzzer_pod_deletion(&self, pod: &FuzzerPod, success: bool) {
        self.free_and_remove(pod);
        self.notify_fuzzer_pod_finished(pod, success).await;
    }

    pub async fn handle(&self, kind: WatchEventKind, pod_object: &PodObject) {
        let pod_name = pod_object.name.clone();

        // Snapshot the registry's view under the lock, then work on a
        // cloned `FuzzerPod` so registry mutations further down don't hold
        // the lock across an `.await`.
        let mut pod = {
            let pod_registry = self.pod_registry.lock().unwrap();
            match pod_registry.find_pod(&pod_name) {
                Ok(pod) => pod.clone(),
                Err(_) => return,
            }
        };

        if pod.start_time.is_none() {
            if let Some(start_time) = pod_object.status.start_time {
                info!(pod = %pod_name, "fuzzer pod is now running");
                pod.start_time = Some(start_time);
            }
        }
        pod.phase = pod_object.status.phase;

        if pod_object.status.deletion_timestamp.is_some() && !pod.deleting {
            info!(pod = %pod_name, "fuzzer pod is terminating (graceful shutdown)");
            self.save_pod_logs(&mut pod).await;
            pod.deleting = true;
        }

        self.sync_pod(&pod);

        if pod.displaced && !pod.deleting {
            info!(pod = %pod_name, "fuzzer pod is marked for deletion");
            self.delete_displaced_pod(&pod).await;
            return;
        }

        if kind == WatchEventKind::Deleted && matches!(pod.phase, PodPhase::Pending | PodPhase::Running) {
            let reason = if pod.phase == PodPhase::Pending { "could not start" } else { "is lost" };
            info!(pod = %pod_name, reason, "fuzzer pod deleted before finishing");
            self.handle_fuzzer_pod_deletion(&pod, false).await;
            return;
        }

        if matches!(pod.phase, PodPhase::Pending | PodPhase::Unknown) {
            return;
        }

        let checker = FuzzerPodStateChecker::new(&pod_object.status);

        if kind == WatchEventKind::Deleted {
            match checker.agent_termination_info() {
                Ok(term_info) => {
                    info!(pod = %pod_name, "fuzzer pod deleted, handling");
                    self.handle_fuzzer_pod_deletion(&pod, term_info.exit_code == 0).await;
                    self.save_pod_launch(&pod, &term_info).await;
                }
                Err(_) => {
                    error!(pod = %pod_name, "fuzzer pod deleted but agent container is not terminated");
                    self.handle_fuzzer_pod_deletion(&pod, false).await;
                }
            }
            return;
        }

        if checker.is_agent_terminated() && !pod.deleting {
            info!(pod = %pod_name, "fuzzer pod's agent exited, deleting pod");
            self.delete_pod_safe(&pod_name).await;
        }
    }

    fn sync_pod(&self, pod: &FuzzerPod) {
        let mut pod_registry = self.pod_registry.lock().unwrap();
        if let Ok(existing) = pod_registry.find_pod_mut(&pod.name) {
            existing.start_time = pod.start_time;
            existing.phase = pod.phase;
            existing.deleting = pod.deleting;
            existing.agent_logs = pod.agent_logs.clone();
            existing.sandbox_logs = pod.sandbox_logs.clone();
            existing.logs_saved = pod.logs_saved;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use starter_mq::FakeMq;
    use starter_orchestrator::{ContainerState, FakeOrchestrator, PodStatusSnapshot};
    use starter_pod::{AgentMode, ContainerExitInfo, Suitcase};
    use starter_store::InMemoryLaunchStore;

    fn config() -> Config {
        Config {
            database: crate::config::DatabaseSettings {
                engine: "arangodb".to_string(),
                url: "http://db".to_string(),
                username: "u".to_string(),
                password: "p".to_string(),
                name: "db".to_string(),
            },
            registry: crate::config::ContainerRegistrySettings { url: "registry.local".to_string() },
            fuzzer_pod: crate::config::FuzzerPodSettings {
                min_work_time: 60,
                namespace: "fuzzing".to_string(),
                test_run_image: "runner:latest".to_string(),
                agent_cpu_m: 100,
                agent_ram_mi: 128,
                output_save_mode: PodOutputSaveMode::All,
                launch_info_retention_period: 3600,
                launch_info_cleanup_interval: 600,
            },
            environment: crate::config::EnvironmentSettings {
                name: "test".to_string(),
                shutdown_timeout: 30,
                service_name: None,
                service_version: None,
                commit_id: None,
                build_date: None,
                commit_date: None,
                git_branch: None,
            },
            message_queue: crate::config::MessageQueueSettings {
                username: "u".to_string(),
                password: "p".to_string(),
                region: "eu".to_string(),
                url: None,
                scheduler_queue: "q".to_string(),
                broker: "sqs".to_string(),
            },
            api_endpoints: crate::config::ApiEndpoints { pool_manager: "http://pool-manager".to_string() },
        }
    }

    fn pod_object(name: &str, status: PodStatusSnapshot) -> PodObject {
        PodObject {
            name: name.to_string(),
            labels: Default::default(),
            node_selector: Default::default(),
            tolerations: Default::default(),
            status,
        }
    }

    fn test_pod(name: &str) -> FuzzerPod {
        FuzzerPod {
            name: name.to_string(),
            phase: PodPhase::Running,
            start_time: Some(Utc::now()),
            displaced: false,
            deleting: false,
            cpu_m: 500,
            ram_mi: 512,
            suitcase: Suitcase {
                user_id: "u".to_string(),
                project_id: "p".to_string(),
                pool_id: "pool".to_string(),
                fuzzer_id: "f".to_string(),
                fuzzer_rev: "r".to_string(),
                agent_mode: AgentMode::Fuzzing,
                fuzzer_lang: "c".to_string(),
                fuzzer_engine: "libfuzzer".to_string(),
                session_id: "s".to_string(),
            },
            agent_logs: None,
            sandbox_logs: None,
            logs_saved: false,
        }
    }

    fn processor() -> (PodEventProcessor, Arc<std::sync::Mutex<PoolRegistry>>, Arc<std::sync::Mutex<PodRegistry>>) {
        let mut pool_registry = PoolRegistry::new();
        pool_registry.create_pool("pool", false).unwrap();
        pool_registry.add_node("pool", "n", 2000, 2048).unwrap();
        pool_registry.allocate("pool", 500, 512).unwrap();
        let pool_registry = Arc::new(std::sync::Mutex::new(pool_registry));

        let mut pod_registry = PodRegistry::new();
        pod_registry.add_pod(test_pod("fuzzer-1")).unwrap();
        let pod_registry = Arc::new(std::sync::Mutex::new(pod_registry));

        let orchestrator: Arc<dyn Orchestrator> = Arc::new(FakeOrchestrator::new());
        let mq: Arc<dyn Mq> = Arc::new(FakeMq::new());
        let store: Arc<dyn LaunchStore> = Arc::new(InMemoryLaunchStore::new());
        let cfg = config();

        let processor =
            PodEventProcessor::new(pool_registry.clone(), pod_registry.clone(), orchestrator, mq, store, &cfg);
        (processor, pool_registry, pod_registry)
    }

    #[tokio::test]
    async fn unknown_pod_is_ignored() {
        let (processor, _, _) = processor();
        let status = PodStatusSnapshot {
            phase: PodPhase::Running,
            start_time: None,
            deletion_timestamp: None,
            agent_state: ContainerState::Running,
            sandbox_state: ContainerState::Running,
            cpu_m: 500,
            ram_mi: 512,
        };
        processor.handle(WatchEventKind::Modified, &pod_object("unknown", status)).await;
    }

    #[tokio::test]
    async fn agent_terminated_triggers_delete() {
        let (processor, _, pod_registry) = processor();
        let exit_info = ContainerExitInfo {
            start_time: Utc::now(),
            finish_time: Utc::now(),
            exit_code: 0,
            reason: "Completed".to_string(),
        };
        let status = PodStatusSnapshot {
            phase: PodPhase::Running,
            start_time: Some(Utc::now()),
            deletion_timestamp: None,
            agent_state: ContainerState::Terminated(exit_info),
            sandbox_state: ContainerState::Running,
            cpu_m: 500,
            ram_mi: 512,
        };
        processor.handle(WatchEventKind::Modified, &pod_object("fuzzer-1", status)).await;
        assert!(pod_registry.lock().unwrap().has_pod("fuzzer-1"));
    }

    #[tokio::test]
    async fn deleted_pod_frees_resources_and_removes_from_registry() {
        let (processor, pool_registry, pod_registry) = processor();
        let exit_info = ContainerExitInfo {
            start_time: Utc::now(),
            finish_time: Utc::now(),
            exit_code: 0,
            reason: "Completed".to_string(),
        };
        let status = PodStatusSnapshot {
            phase: PodPhase::Succeeded,
            start_time: Some(Utc::now()),
            deletion_timestamp: None,
            agent_state: ContainerState::Terminated(exit_info.clone()),
            sandbox_state: ContainerState::Terminated(exit_info),
            cpu_m: 500,
            ram_mi: 512,
        };
        processor.handle(WatchEventKind::Deleted, &pod_object("fuzzer-1", status)).await;

        assert!(!pod_registry.lock().unwrap().has_pod("fuzzer-1"));
        assert_eq!(pool_registry.lock().unwrap().resources_left("pool").unwrap(), (2000, 2048));
    }
}
