//! Stack Deck - 本地栈服务控制面
//!
//! 构建、启动并观察栈中的各个服务容器

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod infra;
pub mod services;
pub mod state;

use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::env::constants::VERSION;
use crate::state::AppState;

/// 命令行覆盖的运行参数
#[derive(Clone, Debug, Default)]
pub struct RuntimeConfig {
    pub port_override: Option<u16>,
    pub host_override: Option<String>,
}

/// 构建路由（测试可以注入自己的 `AppState`）
pub fn build_router(state: Arc<AppState>) -> axum::Router {
    api::router(state)
}

/// 初始化日志并启动 HTTP 服务
pub async fn init_and_run_with_config(runtime: RuntimeConfig) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("stack_deck=info,tower_http=info")),
        )
        .init();

    let mut state = AppState::from_env()?;
    if let Some(port) = runtime.port_override {
        state.config.port = port;
    }
    if let Some(host) = runtime.host_override {
        state.config.host = host;
    }

    let addr = format!("{}:{}", state.config.host, state.config.port);
    let state = Arc::new(state);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(version = VERSION, addr = %addr, "Stack deck listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stack deck stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
