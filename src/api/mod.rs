//! API 模块
//!
//! HTTP handlers 和路由组装

pub mod build;
pub mod dashboard;
pub mod extract;
pub mod health;
pub mod services;
pub mod settings;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// 构建完整的 API 路由
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(dashboard::router())
        .merge(services::router())
        .merge(settings::router())
        .merge(build::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
