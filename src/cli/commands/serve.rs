use anyhow::Context;
use std::net::SocketAddr;

use crate::config::AppConfig;
use crate::handlers::public::health;
use crate::routes::app;
use crate::services::{ensure_admin, seed_demo_data, UserService};
use crate::state::AppState;

pub async fn handle(mut config: AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.server.port = port;
    }
    health::mark_started();

    let (store, registry) = super::prepare_storage(&config).await?;

    if config.bootstrap.seed_demo_data && config.is_development() {
        seed_demo_data(store.clone(), &config.bootstrap).await?;
    } else {
        ensure_admin(&UserService::new(store.clone()), &config.bootstrap).await?;
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let rate_limiting = config.api.enable_rate_limiting;
    let state = AppState::new(config, store, registry).context("failed to initialize token service")?;
    if rate_limiting {
        state.rate_limiter.clone().spawn_cleanup();
    }

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("Mini CRM API listening on http://{}", bind_addr);

    axum::serve(listener, app(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

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
