//! 构建 API
//!
//! POST /api/build 以 NDJSON 流返回构建事件，流开始后的失败都在流内报告

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::env::constants::EVENT_CHANNEL_CAPACITY;
use crate::domain::build::BuildOptions;
use super::extract::ApiJson;
use crate::error::{ApiError, ApiResult};
use crate::services::build::{BuildOrchestrator, BuildPlan, BuildReporter, LaunchOverrides};
use crate::state::AppState;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/build", post(start_build))
}

/// 构建请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildRequest {
    /// 服务名或分组名
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub use_no_cache: bool,
}

/// POST /api/build
async fn start_build(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<BuildRequest>,
) -> ApiResult<Response> {
    let services = state.registry.resolve_targets(&request.services)?;
    let names: Vec<String> = services.iter().map(|s| s.name.clone()).collect();

    let lease = state.build_locks.try_acquire(&names).map_err(|busy| {
        ApiError::conflict(format!("Already building: {}", busy.join(", ")))
    })?;

    let settings = state.settings.read().await?;
    let overrides = LaunchOverrides::from_settings(&settings.settings);

    let request_id = uuid::Uuid::new_v4().to_string();
    info!(
        request_id = %request_id,
        services = ?names,
        use_no_cache = request.use_no_cache,
        "Build requested"
    );

    let orchestrator = BuildOrchestrator::new(
        state.engine.clone(),
        state.history.clone(),
        state.launcher(overrides.engine_socket),
        state.config.builder_image.clone(),
    )
    .with_build_env(overrides.build_env);
    let plan = BuildPlan {
        services,
        options: BuildOptions {
            use_no_cache: request.use_no_cache,
        },
    };

    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let reporter = BuildReporter::new(request_id.clone(), tx);
    let cancel = CancellationToken::new();

    let task_cancel = cancel.clone();
    let task_request_id = request_id.clone();
    tokio::spawn(async move {
        // 租约随任务结束释放
        let _lease = lease;
        let outcome = orchestrator.run(plan, reporter, task_cancel).await;
        if !outcome.ok {
            warn!(
                request_id = %task_request_id,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Build request failed"
            );
        }
    });

    // 响应体被丢弃（客户端断开）时取消构建
    let guard = cancel.drop_guard();
    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = rx.recv().await {
            let terminal = event.is_terminal();
            yield Ok::<_, Infallible>(event.to_ndjson());
            if terminal {
                break;
            }
        }
    };

    Ok((
        [
            (header::CONTENT_TYPE, NDJSON_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}
