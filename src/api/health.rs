//! 健康检查 API

use axum::{routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    ok: bool,
}

/// 创建健康检查路由
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}

/// GET /health
///
/// 不依赖引擎和设置存储，进程存活即返回
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}
