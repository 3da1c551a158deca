use std::sync::Arc;

use starter::config::Config;
use starter::startup::RunningService;
use starter::state::AppState;
use starter_mq::FakeMq;
use starter_orchestrator::FakeOrchestrator;
use starter_poolclient::PoolManagerClient;
use starter_store::InMemoryLaunchStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Arc::new(Config::from_env()?);

    // No real Kubernetes/message-queue backends are wired up; only the
    // in-memory doubles exist in this workspace (see DESIGN.md).
    let orchestrator: Arc<dyn starter_orchestrator::Orchestrator> = Arc::new(FakeOrchestrator::new());
    let mq = Arc::new(FakeMq::new());
    let store = Arc::new(InMemoryLaunchStore::new());
    let pool_client = Arc::new(PoolManagerClient::new(&config.api_endpoints.pool_manager)?);

    let state = Arc::new(AppState::new(orchestrator, mq.clone(), store, config.clone()));

    let service = RunningService::start(state.clone(), pool_client, mq.clone(), &config).await?;

    let app = starter::routes::router(state.clone());
    let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
