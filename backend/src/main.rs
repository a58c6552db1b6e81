use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use concierge_backend::config::Config;
use concierge_backend::handlers::app_router;
use concierge_backend::jobs::JobScheduler;
use concierge_backend::notifications::LoggingGateway;
use concierge_backend::roles::StaticRoleDirectory;
use concierge_backend::workflows::{SystemClock, WorkflowEngine};
use concierge_backend::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let engine = Arc::new(WorkflowEngine::new(
        config.engine.clone(),
        Arc::new(LoggingGateway),
        Arc::new(StaticRoleDirectory::new(&config.roles)),
        Arc::new(SystemClock),
    ));

    let scheduler = JobScheduler::new(engine.clone(), config.jobs.clone()).await?;
    scheduler.start().await?;

    let app = app_router(Arc::new(AppState::new(engine)));

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await?;
    tracing::info!("Server running on {}", config.server_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown().await?;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
