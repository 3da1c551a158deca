//! HTTP surface: run a fuzzer in a pool, and stop one fuzzer's pods or all
//! of a pool's pods.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{delete, post};
use axum::{Json, Router};
use serde::Deserialize;
use starter_orchestrator::CreatePodRequest;
use starter_pod::{AgentMode, FuzzerPod, PodPhase, Suitcase};
use starter_pool::PoolError;
use tracing::{error, info};

use crate::displacement::try_displace_pods;
use crate::error::{ApiError, ApiErrorCode, ApiOk};
use crate::images::{agent_image_name, sandbox_image_name};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/pools/{pool_id}/fuzzers", post(run_fuzzer).delete(stop_all_fuzzer_pods))
        .route("/pools/{pool_id}/fuzzers/{fuzzer_id}", delete(stop_fuzzer_pods))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct RunFuzzerRequest {
    pub user_id: String,
    pub project_id: String,
    pub session_id: String,
    pub fuzzer_id: String,
    pub fuzzer_rev: String,
    pub fuzzer_engine: String,
    pub fuzzer_lang: String,
    pub agent_mode: String,
    pub image_id: String,
    pub cpu_usage: i64,
    pub ram_usage: i64,
    pub tmpfs_size: i64,
}

/// `LimitedString`: 1..=64 chars.
fn is_limited_string(value: &str) -> bool {
    let len = value.chars().count();
    (1..=64).contains(&len)
}

impl RunFuzzerRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let strings = [
            ("user_id", &self.user_id),
            ("project_id", &self.project_id),
            ("session_id", &self.session_id),
            ("fuzzer_id", &self.fuzzer_id),
            ("fuzzer_rev", &self.fuzzer_rev),
            ("fuzzer_engine", &self.fuzzer_engine),
            ("fuzzer_lang", &self.fuzzer_lang),
            ("agent_mode", &self.agent_mode),
            ("image_id", &self.image_id),
        ];
        for (field, value) in strings {
            if !is_limited_string(value) {
                info!(field, "rejected launch request: field must be 1..=64 chars");
                return Err(ApiError::new(ApiErrorCode::InvalidRequest));
            }
        }

        let usages = [
            ("cpu_usage", self.cpu_usage),
            ("ram_usage", self.ram_usage),
            ("tmpfs_size", self.tmpfs_size),
        ];
        for (field, value) in usages {
            if value <= 0 {
                info!(field, value, "rejected launch request: usage must be positive");
                return Err(ApiError::new(ApiErrorCode::InvalidRequest));
            }
        }

        Ok(())
    }
}

/// Allocates resources for a new fuzzer pod in `pool_id`, creates it, and
/// tracks it in the pod registry. A `firstrun` launch that can't fit
/// triggers a background attempt to displace lower-priority `fuzzing` pods
/// so a retry has a chance of succeeding.
async fn run_fuzzer(
    State(state): State<Arc<AppState>>,
    Path(pool_id): Path<String>,
    Json(launch): Json<RunFuzzerRequest>,
) -> Result<ApiOk, ApiError> {
    launch.validate()?;

    let sandbox_cpu = launch.cpu_usage;
    let sandbox_ram = launch.ram_usage + launch.tmpfs_size;
    let agent_cpu = state.config.fuzzer_pod.agent_cpu_m;
    let agent_ram = state.config.fuzzer_pod.agent_ram_mi;
    let total_cpu = sandbox_cpu + agent_cpu;
    let total_ram = sandbox_ram + agent_ram;

    let allocate_result = {
        let mut pool_registry = state.pool_registry.lock().unwrap();
        pool_registry.allocate(&pool_id, total_cpu, total_ram)
    };

    if let Err(e) = allocate_result {
        use starter_pool::PoolRegistryError as RegErr;
        let code = match &e {
            RegErr::PoolNotFound(_) => ApiErrorCode::PoolNotFound,
            RegErr::PoolAlreadyExists(_) => return Err(anyhow::anyhow!(e).into()),
            RegErr::Pool(PoolError::PoolLocked) => ApiErrorCode::PoolLocked,
            RegErr::Pool(PoolError::PoolCapacityExceeded { .. }) => ApiErrorCode::PoolTooSmall,
            RegErr::Pool(PoolError::PoolOverflow { .. }) | RegErr::Pool(PoolError::PoolNoResourcesLeft { .. }) => {
                maybe_kick_off_displacement(&state, &pool_id, &launch.agent_mode, total_cpu, total_ram);
                ApiErrorCode::PoolNoResources
            }
            RegErr::Pool(PoolError::PoolUnderflow { .. })
            | RegErr::Pool(PoolError::NodeAlreadyExists(_))
            | RegErr::Pool(PoolError::NodeNotFound(_)) => return Err(anyhow::anyhow!(e).into()),
        };
        info!(pool = %pool_id, fuzzer_id = %launch.fuzzer_id, error = %e, "run fuzzer rejected");
        return Err(ApiError::new(code));
    }

    let agent_image = agent_image_name(&state.config, &launch.fuzzer_engine);
    let sandbox_image = sandbox_image_name(&state.config, &launch.image_id);

    let request = CreatePodRequest {
        user_id: launch.user_id.clone(),
        project_id: launch.project_id.clone(),
        pool_id: pool_id.clone(),
        fuzzer_id: launch.fuzzer_id.clone(),
        fuzzer_rev: launch.fuzzer_rev.clone(),
        agent_mode: launch.agent_mode.clone(),
        fuzzer_lang: launch.fuzzer_lang.clone(),
        fuzzer_engine: launch.fuzzer_engine.clone(),
        session_id: launch.session_id.clone(),
        agent_image,
        sandbox_image,
        agent_cpu_m: agent_cpu,
        agent_ram_mi: agent_ram,
        sandbox_cpu_m: sandbox_cpu,
        sandbox_ram_mi: sandbox_ram,
        tmpfs_size_mi: launch.tmpfs_size,
    };

    let pod = match state.orchestrator.create_fuzzer_pod(request).await {
        Ok(pod) => pod,
        Err(e) => {
            let mut pool_registry = state.pool_registry.lock().unwrap();
            if let Err(free_err) = pool_registry.free(&pool_id, total_cpu, total_ram) {
                error!(pool = %pool_id, error = %free_err, "failed to free resources after pod creation failure");
            }
            return Err(anyhow::anyhow!(e).into());
        }
    };

    let fuzzer_pod = FuzzerPod {
        name: pod.name,
        phase: PodPhase::Pending,
        start_time: None,
        displaced: false,
        deleting: false,
        cpu_m: total_cpu,
        ram_mi: total_ram,
        suitcase: Suitcase {
            user_id: launch.user_id,
            project_id: launch.project_id,
            pool_id: pool_id.clone(),
            fuzzer_id: launch.fuzzer_id.clone(),
            fuzzer_rev: launch.fuzzer_rev,
            agent_mode: AgentMode::from(launch.agent_mode.as_str()),
            fuzzer_lang: launch.fuzzer_lang,
            fuzzer_engine: launch.fuzzer_engine,
            session_id: launch.session_id,
        },
        agent_logs: None,
        sandbox_logs: None,
        logs_saved: false,
    };

    {
        let mut pod_registry = state.pod_registry.lock().unwrap();
        if let Err(e) = pod_registry.add_pod(fuzzer_pod) {
            error!(pool = %pool_id, fuzzer_id = %launch.fuzzer_id, error = %e, "failed to register created pod");
            return Err(anyhow::anyhow!(e).into());
        }
    }

    info!(pool = %pool_id, fuzzer_id = %launch.fuzzer_id, agent_mode = %launch.agent_mode, "fuzzer launched");
    Ok(ApiOk(axum::http::StatusCode::CREATED))
}

fn maybe_kick_off_displacement(state: &Arc<AppState>, pool_id: &str, agent_mode: &str, total_cpu: i64, total_ram: i64) {
    if agent_mode != "firstrun" {
        return;
    }

    let already_displacing = state.pod_registry.lock().unwrap().displacement_in_progress(pool_id);
    if already_displacing {
        return;
    }

    let free = state.pool_registry.lock().unwrap().resources_left(pool_id);
    let Ok((free_cpu, free_ram)) = free else {
        return;
    };

    let cpu_required = total_cpu - free_cpu;
    let ram_required = total_ram - free_ram;
    let state = state.clone();
    let pool_id = pool_id.to_string();

    tokio::spawn(async move {
        try_displace_pods(&state.pod_registry, &state.orchestrator, &pool_id, cpu_required, ram_required).await;
    });
}

async fn stop_fuzzer_pods(
    State(state): State<Arc<AppState>>,
    Path((pool_id, fuzzer_id)): Path<(String, String)>,
) -> Result<ApiOk, ApiError> {
    state
        .orchestrator
        .delete_fuzzer_pods(Some(&fuzzer_id), Some(&pool_id))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    info!(pool = %pool_id, fuzzer_id = %fuzzer_id, "fuzzer pods stopped");
    Ok(ApiOk(axum::http::StatusCode::OK))
}

async fn stop_all_fuzzer_pods(State(state): State<Arc<AppState>>, Path(pool_id): Path<String>) -> Result<ApiOk, ApiError> {
    state
        .orchestrator
        .delete_fuzzer_pods(None, Some(&pool_id))
        .await
        .map_err(|e| anyhow::anyhow!(e))?;
    info!(pool = %pool_id, "all fuzzer pods stopped");
    Ok(ApiOk(axum::http::StatusCode::OK))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use starter_mq::FakeMq;
    use starter_orchestrator::{FakeOrchestrator, Orchestrator};
    use starter_store::InMemoryLaunchStore;
    use tower::ServiceExt;

    fn config() -> Config {
        std::env::set_var("DB_ENGINE", "arangodb");
        std::env::set_var("DB_URL", "http://db");
        std::env::set_var("DB_USERNAME", "u");
        std::env::set_var("DB_PASSWORD", "p");
        std::env::set_var("DB_NAME", "n");
        std::env::set_var("CONTAINER_REGISTRY_URL", "registry.example.com");
        std::env::set_var("POD_AGENT_CPU", "100m");
        std::env::set_var("POD_AGENT_RAM", "128Mi");
        std::env::set_var("POD_OUTPUT_SAVE_MODE", "Error");
        std::env::set_var("POD_MIN_WORK_TIME", "30s");
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
        crate::config::Config::from_env().unwrap()
    }

    fn app() -> (Router, Arc<AppState>) {
        let orchestrator: Arc<dyn Orchestrator> = Arc::new(FakeOrchestrator::new());
        let mq = Arc::new(FakeMq::new());
        let store = Arc::new(InMemoryLaunchStore::new());
        let state = Arc::new(AppState::new(orchestrator, mq, store, Arc::new(config())));
        state.pool_registry.lock().unwrap().create_pool("pool-1", false).unwrap();
        state.pool_registry.lock().unwrap().add_node("pool-1", "node-1", 4000, 4096).unwrap();
        (router(state.clone()), state)
    }

    fn launch_body() -> String {
        serde_json::json!({
            "user_id": "u1",
            "project_id": "p1",
            "session_id": "s1",
            "fuzzer_id": "f1",
            "fuzzer_rev": "r1",
            "fuzzer_engine": "libfuzzer",
            "fuzzer_lang": "c",
            "agent_mode": "fuzzing",
            "image_id": "img1",
            "cpu_usage": 500,
            "ram_usage": 512,
            "tmpfs_size": 64
        })
        .to_string()
    }

    #[tokio::test]
    async fn run_fuzzer_succeeds_and_registers_pod() {
        let (app, state) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/pools/pool-1/fuzzers")
                    .header("content-type", "application/json")
                    .body(Body::from(launch_body()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(state.pod_registry.lock().unwrap().list_pods().count(), 1);
    }

    #[tokio::test]
    async fn run_fuzzer_on_missing_pool_returns_not_found() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/pools/missing/fuzzers")
                    .header("content-type", "application/json")
                    .body(Body::from(launch_body()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn run_fuzzer_with_empty_field_is_rejected() {
        let (app, _) = app();
        let body = serde_json::json!({
            "user_id": "",
            "project_id": "p1",
            "session_id": "s1",
            "fuzzer_id": "f1",
            "fuzzer_rev": "r1",
            "fuzzer_engine": "libfuzzer",
            "fuzzer_lang": "c",
            "agent_mode": "fuzzing",
            "image_id": "img1",
            "cpu_usage": 500,
            "ram_usage": 512,
            "tmpfs_size": 64
        })
        .to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/pools/pool-1/fuzzers")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn run_fuzzer_with_non_positive_usage_is_rejected() {
        let (app, _) = app();
        let body = serde_json::json!({
            "user_id": "u1",
            "project_id": "p1",
            "session_id": "s1",
            "fuzzer_id": "f1",
            "fuzzer_rev": "r1",
            "fuzzer_engine": "libfuzzer",
            "fuzzer_lang": "c",
            "agent_mode": "fuzzing",
            "image_id": "img1",
            "cpu_usage": 0,
            "ram_usage": 512,
            "tmpfs_size": 64
        })
        .to_string();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/pools/pool-1/fuzzers")
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn stop_all_fuzzer_pods_returns_ok() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri("/pools/pool-1/fuzzers")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
