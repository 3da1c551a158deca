//! Exercises `PodEventProcessor` directly against the in-memory doubles for
//! the two outcomes that don't go through the HTTP admission path: a
//! displaced pod deferring its own deletion until it has run for the
//! configured minimum work time, and a pod lost mid-run with no terminal
//! container state still being reconciled as a failure.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use starter::config::Config;
use starter::pod_events::PodEventProcessor;
use starter_mq::FakeMq;
use starter_orchestrator::{
    ContainerState, CreatePodRequest, FakeOrchestrator, Orchestrator, PodObject, PodStatusSnapshot, WatchEventKind,
};
use starter_pod::{AgentMode, FuzzerPod, PodPhase, PodRegistry, Suitcase};
use starter_pool::PoolRegistry;
use starter_store::InMemoryLaunchStore;

fn set_env() {
    std::env::set_var("DB_ENGINE", "arangodb");
    std::env::set_var("DB_URL", "http://db");
    std::env::set_var("DB_USERNAME", "u");
    std::env::set_var("DB_PASSWORD", "p");
    std::env::set_var("DB_NAME", "n");
    std::env::set_var("CONTAINER_REGISTRY_URL", "registry.example.com");
    std::env::set_var("POD_AGENT_CPU", "100m");
    std::env::set_var("POD_AGENT_RAM", "128Mi");
    std::env::set_var("POD_OUTPUT_SAVE_MODE", "Error");
    std::env::set_var("POD_MIN_WORK_TIME", "60s");
    std::env::set_var("POD_NAMESPACE", "fuzzing");
    std::env::set_var("POD_TEST_RUN_IMAGE", "test-run");
    std::env::set_var("POD_LAUNCH_INFO_RETENTION_PERIOD", "1d");
    std::env::set_var("POD_LAUNCH_INFO_CLEANUP_INTERVAL", "1h");
    std::env::set_var("ENVIRONMENT", "test");
    std::env::set_var("SHUTDOWN_TIMEOUT", "30s");
    std::env::set_var("MQ_BROKER", "sqs");
    std::env::set_var("MQ_USERNAME", "u");
    std::env::set_var("MQ_PASSWORD", "p");
    std::env::set_var("MQ_REGION", "eu");
    std::env::set_var("MQ_QUEUE_SCHEDULER", "scheduler");
    std::env::set_var("API_URL_POOL_MANAGER", "http://pool-manager");
}

fn suitcase() -> Suitcase {
    Suitcase {
        user_id: "u1".to_string(),
        project_id: "p1".to_string(),
        pool_id: "pool-1".to_string(),
        fuzzer_id: "f1".to_string(),
        fuzzer_rev: "r1".to_string(),
        agent_mode: AgentMode::Fuzzing,
        fuzzer_lang: "c".to_string(),
        fuzzer_engine: "libfuzzer".to_string(),
        session_id: "s1".to_string(),
    }
}

fn create_request() -> CreatePodRequest {
    CreatePodRequest {
        user_id: "u1".to_string(),
        project_id: "p1".to_string(),
        pool_id: "pool-1".to_string(),
        fuzzer_id: "f1".to_string(),
        fuzzer_rev: "r1".to_string(),
        agent_mode: "fuzzing".to_string(),
        fuzzer_lang: "c".to_string(),
        fuzzer_engine: "libfuzzer".to_string(),
        session_id: "s1".to_string(),
        agent_image: "registry.example.com/agents/libfuzzer".to_string(),
        sandbox_image: "registry.example.com/sandbox/img1".to_string(),
        agent_cpu_m: 100,
        agent_ram_mi: 128,
        sandbox_cpu_m: 500,
        sandbox_ram_mi: 512,
        tmpfs_size_mi: 64,
    }
}

fn running_status(start_time: chrono::DateTime<Utc>) -> PodStatusSnapshot {
    PodStatusSnapshot {
        phase: PodPhase::Running,
        start_time: Some(start_time),
        deletion_timestamp: None,
        agent_state: ContainerState::Running,
        sandbox_state: ContainerState::Running,
        cpu_m: 600,
        ram_mi: 640,
    }
}

#[tokio::test(start_paused = true)]
async fn displaced_pod_is_not_deleted_before_min_work_time_elapses() {
    set_env();
    let cfg = Config::from_env().unwrap();

    let mut pool_registry = PoolRegistry::new();
    pool_registry.create_pool("pool-1", false).unwrap();
    pool_registry.add_node("pool-1", "node-1", 2000, 2048).unwrap();
    pool_registry.allocate("pool-1", 600, 640).unwrap();
    let pool_registry = Arc::new(Mutex::new(pool_registry));

    let orchestrator: Arc<dyn Orchestrator> = Arc::new(FakeOrchestrator::new());
    let created = orchestrator.create_fuzzer_pod(create_request()).await.unwrap();

    let start_time = Utc::now() - Duration::seconds(30);
    let mut pod_registry = PodRegistry::new();
    pod_registry
        .add_pod(FuzzerPod {
            name: created.name.clone(),
            phase: PodPhase::Running,
            start_time: Some(start_time),
            displaced: false,
            deleting: false,
            cpu_m: 600,
            ram_mi: 640,
            suitcase: suitcase(),
            agent_logs: None,
            sandbox_logs: None,
            logs_saved: false,
        })
        .unwrap();
    pod_registry.displace_pod(&created.name).unwrap();
    let pod_registry = Arc::new(Mutex::new(pod_registry));

    let mq: Arc<dyn starter_mq::Mq> = Arc::new(FakeMq::new());
    let store: Arc<dyn starter_store::LaunchStore> = Arc::new(InMemoryLaunchStore::new());
    let processor = PodEventProcessor::new(pool_registry, pod_registry, orchestrator.clone(), mq, store, &cfg);

    let pod_object = PodObject {
        name: created.name.clone(),
        labels: created.labels.clone(),
        node_selector: created.node_selector.clone(),
        tolerations: created.tolerations.clone(),
        status: running_status(start_time),
    };
    processor.handle(WatchEventKind::Modified, &pod_object).await;

    let still_present = orchestrator.list_fuzzer_pods().await.unwrap();
    assert!(
        still_present.iter().any(|p| p.name == created.name),
        "displaced pod was deleted before its minimum work time elapsed"
    );

    tokio::time::advance(StdDuration::from_secs(31)).await;

    let after_delay = orchestrator.list_fuzzer_pods().await.unwrap();
    assert!(
        !after_delay.iter().any(|p| p.name == created.name),
        "displaced pod should be deleted once its minimum work time has elapsed"
    );
}

#[tokio::test]
async fn pod_lost_while_running_is_reconciled_as_a_failure() {
    set_env();
    let cfg = Config::from_env().unwrap();

    let mut pool_registry = PoolRegistry::new();
    pool_registry.create_pool("pool-1", false).unwrap();
    pool_registry.add_node("pool-1", "node-1", 2000, 2048).unwrap();
    pool_registry.allocate("pool-1", 600, 640).unwrap();
    let pool_registry = Arc::new(Mutex::new(pool_registry));

    let mut pod_registry = PodRegistry::new();
    pod_registry
        .add_pod(FuzzerPod {
            name: "fuzzer-1".to_string(),
            phase: PodPhase::Running,
            start_time: Some(Utc::now()),
            displaced: false,
            deleting: false,
            cpu_m: 600,
            ram_mi: 640,
            suitcase: suitcase(),
            agent_logs: None,
            sandbox_logs: None,
            logs_saved: false,
        })
        .unwrap();
    let pod_registry = Arc::new(Mutex::new(pod_registry));

    let orchestrator: Arc<dyn Orchestrator> = Arc::new(FakeOrchestrator::new());
    let mq = Arc::new(FakeMq::new());
    let store: Arc<dyn starter_store::LaunchStore> = Arc::new(InMemoryLaunchStore::new());
    let processor =
        PodEventProcessor::new(pool_registry.clone(), pod_registry.clone(), orchestrator, mq.clone(), store, &cfg);

    let lost_status = PodStatusSnapshot {
        phase: PodPhase::Running,
        start_time: Some(Utc::now()),
        deletion_timestamp: None,
        agent_state: ContainerState::Waiting,
        sandbox_state: ContainerState::Waiting,
        cpu_m: 600,
        ram_mi: 640,
    };
    let pod_object = PodObject {
        name: "fuzzer-1".to_string(),
        labels: Default::default(),
        node_selector: Default::default(),
        tolerations: Default::default(),
        status: lost_status,
    };

    processor.handle(WatchEventKind::Deleted, &pod_object).await;

    assert!(!pod_registry.lock().unwrap().has_pod("fuzzer-1"));
    assert_eq!(pool_registry.lock().unwrap().resources_left("pool-1").unwrap(), (2000, 2048));

    let published = mq.published();
    assert_eq!(published.len(), 1);
    assert!(!published[0].success);
}
