//! 控制台页面

use axum::{extract::State, response::Html, routing::get, Router};
use std::sync::Arc;
use tracing::{error, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

/// GET /
///
/// 原样返回前端构建产物，缺失时 503，存在但读不出来时 500
async fn index(State(state): State<Arc<AppState>>) -> ApiResult<Html<String>> {
    let path = &state.config.dashboard_path;
    match tokio::fs::read_to_string(path).await {
        Ok(document) => Ok(Html(document)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Dashboard document missing");
            Err(ApiError::service_unavailable(format!(
                "Dashboard is not built ({})",
                path.display()
            )))
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read dashboard document");
            Err(ApiError::internal(format!(
                "Failed to read dashboard ({}): {}",
                path.display(),
                e
            )))
        }
    }
}
