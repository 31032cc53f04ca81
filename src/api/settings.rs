//! 设置 API

use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info};

use super::extract::ApiJson;
use crate::error::{ApiError, ApiResult};
use crate::infra::settings_store::SettingsEnvelope;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api/settings", get(read_settings).patch(update_settings))
}

/// GET /api/settings
///
/// 返回存储的信封 `{ok, settings}`
async fn read_settings(State(state): State<Arc<AppState>>) -> ApiResult<Json<SettingsEnvelope>> {
    let envelope = state.settings.read().await.map_err(|e| {
        error!(error = %e, "Failed to read settings");
        ApiError::from(e)
    })?;
    Ok(Json(envelope))
}

/// PATCH /api/settings
///
/// 请求体是部分设置对象，返回合并后的设置（不带信封）
async fn update_settings(
    State(state): State<Arc<AppState>>,
    ApiJson(partial): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    if !partial.is_object() {
        return Err(ApiError::bad_request("Settings patch must be a JSON object"));
    }

    let keys: Vec<String> = partial
        .as_object()
        .map(|obj| obj.keys().cloned().collect())
        .unwrap_or_default();

    let envelope = state.settings.update(partial).await.map_err(|e| {
        error!(error = %e, "Failed to update settings");
        ApiError::from(e)
    })?;

    info!(keys = ?keys, "Settings updated");
    Ok(Json(envelope.settings))
}
