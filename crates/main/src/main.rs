//! 群聊服务入口
//!
//! 读取配置、连接数据库并执行迁移，然后启动 Axum HTTP / WebSocket 服务。

use std::io;

use anyhow::Context;
use config::AppConfig;
use infrastructure::{Infrastructure, InfrastructureConfig};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use web_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    let infra = Infrastructure::connect(&InfrastructureConfig::from(&config))
        .await
        .context("failed to initialise storage")?;
    let state = AppState::build(infra, &config);
    let app = router(state);

    let listener = bind_with_retry(&config.server.host, config.server.port, config.server.port_retries)
        .await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "groupchat server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// 端口被占用时依次尝试后续端口
async fn bind_with_retry(host: &str, port: u16, retries: u16) -> anyhow::Result<TcpListener> {
    let mut candidate = port;
    for attempt in 0..=retries {
        match TcpListener::bind((host, candidate)).await {
            Ok(listener) => return Ok(listener),
            Err(err) if err.kind() == io::ErrorKind::AddrInUse && attempt < retries => {
                tracing::warn!(port = candidate, "port in use, trying next");
                candidate = candidate
                    .checked_add(1)
                    .context("no free port left to try")?;
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to bind {host}:{candidate}"));
            }
        }
    }
    anyhow::bail!("failed to bind {host}:{port} after {retries} retries")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
