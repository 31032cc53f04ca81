//! 服务 API
//!
//! 包含 /api/services 快照和单服务启动

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info};

use crate::domain::container::{ContainerInfo, LifecycleStatus};
use crate::error::{ApiError, ApiResult};
use crate::infra::engine::EngineError;
use crate::services::build::LaunchOverrides;
use crate::services::snapshot::{ServiceSnapshot, SnapshotOptions};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/services", get(list_services))
        .route("/api/services/:name/launch", post(launch_service))
}

/// 快照查询参数
#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    #[serde(default = "default_true")]
    pub containers: bool,
    #[serde(default = "default_true")]
    pub history: bool,
}

fn default_true() -> bool {
    true
}

/// GET /api/services
async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SnapshotQuery>,
) -> ApiResult<Json<ServiceSnapshot>> {
    let options = SnapshotOptions {
        include_containers: query.containers,
        include_history: query.history,
    };

    let snapshot = state.aggregator().snapshot(options).await.map_err(|e| {
        error!(error = %e, "Failed to list containers");
        ApiError::service_unavailable(format!("Container engine unavailable: {}", e))
    })?;
    Ok(Json(snapshot))
}

#[derive(Debug, Serialize)]
pub struct LaunchResponse {
    pub ok: bool,
    pub container: ContainerInfo,
}

/// POST /api/services/:name/launch
///
/// 用服务镜像创建并启动容器，结果写入生命周期历史
async fn launch_service(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<Json<LaunchResponse>> {
    let service = state
        .registry
        .get(&name)
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("Service '{}'", name)))?;

    let settings = state.settings.read().await?;
    let overrides = LaunchOverrides::from_settings(&settings.settings);

    let env = BTreeMap::from([
        ("STACK_SERVICE".to_string(), service.name.clone()),
        ("STACK_SERVICE_GROUP".to_string(), service.group.clone()),
    ]);
    let spec = state
        .launcher(overrides.engine_socket)
        .build(&service.name, &service.image, &env);

    let result: Result<ContainerInfo, EngineError> = async {
        let id = state.engine.create_container(&service.name, &spec).await?;
        state.engine.start_container(&id).await?;
        state.engine.inspect_container(&id).await
    }
    .await;

    match result {
        Ok(container) => {
            info!(service = %service.name, container = %container.id, "Service launched");
            state
                .history
                .push(
                    &service.name,
                    LifecycleStatus::Launched,
                    Some(container.id.clone()),
                )
                .await;
            Ok(Json(LaunchResponse {
                ok: true,
                container,
            }))
        }
        Err(e) => {
            error!(service = %service.name, error = %e, "Failed to launch service");
            state
                .history
                .push(&service.name, LifecycleStatus::LaunchFailed, Some(e.to_string()))
                .await;
            Err(ApiError::from(e))
        }
    }
}
