use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;

use legalitea::{
    AiService, AnalysisStore, AppState, Config, create_router,
    logging::init_logging,
    log_system_event,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    // Hold the guard until exit or buffered file output is lost
    let _guard = init_logging(&config.logging)?;

    config.validate()?;
    config.log_configuration_summary();

    log_system_event!(startup, component = "server", "starting LegaliTea backend");

    let store = AnalysisStore::from_config(&config.storage).await?;
    let ai_service = AiService::from_config(&config.llm);
    info!(
        provider = ai_service.provider_name(),
        model = ai_service.model_name(),
        configured = ai_service.is_configured(),
        "Initialized AI service"
    );

    let rate_limit_sweep = Duration::from_secs(config.rate_limit.cleanup_interval_secs.max(1));
    let purge_interval = Duration::from_secs(config.storage.purge_interval_secs.max(1));
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = AppState::new(config, ai_service, store);

    let background_tasks = [
        state.rate_limiter.spawn_cleanup_task(rate_limit_sweep),
        state.save_limiter.spawn_cleanup_task(rate_limit_sweep),
        state.store.spawn_purge_task(purge_interval),
    ];

    let app = create_router(state).layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for task in background_tasks {
        task.abort();
    }

    log_system_event!(shutdown, component = "server", "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections");
}
