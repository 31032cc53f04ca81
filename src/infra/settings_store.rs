//! 运行时设置存储
//!
//! 约定：接受部分更新，返回合并并持久化后的完整设置

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 设置存储错误
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings patch must be a JSON object")]
    InvalidPatch,
}

/// 存储返回的信封
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettingsEnvelope {
    pub ok: bool,
    pub settings: Value,
}

impl SettingsEnvelope {
    pub fn new(settings: Value) -> Self {
        Self { ok: true, settings }
    }
}

/// 设置存储
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn read(&self) -> Result<SettingsEnvelope, SettingsError>;

    /// 合并部分更新并返回合并后的结果
    async fn update(&self, partial: Value) -> Result<SettingsEnvelope, SettingsError>;
}

/// 递归合并：对象逐键合并，其他类型直接覆盖
pub fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, patch) => *base = patch,
    }
}

/// JSON 文件存储
///
/// 读-改-写在互斥锁内完成，写入走临时文件 + rename
pub struct JsonFileSettingsStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<Value, SettingsError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Value::Object(Map::new()));
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        let value: Value = serde_json::from_str(&content)?;
        if !value.is_object() {
            warn!(path = %self.path.display(), "Settings file root is not an object, ignoring");
            return Ok(Value::Object(Map::new()));
        }
        Ok(value)
    }

    async fn save(&self, settings: &Value) -> Result<(), SettingsError> {
        let temp_path = self.path.with_extension("json.tmp");

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&temp_path, &content).await?;
        fs::rename(&temp_path, &self.path).await?;

        info!(path = %self.path.display(), "Saved settings");
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettingsStore {
    async fn read(&self) -> Result<SettingsEnvelope, SettingsError> {
        let _guard = self.lock.lock().await;
        Ok(SettingsEnvelope::new(self.load().await?))
    }

    async fn update(&self, partial: Value) -> Result<SettingsEnvelope, SettingsError> {
        if !partial.is_object() {
            return Err(SettingsError::InvalidPatch);
        }

        let _guard = self.lock.lock().await;
        let mut settings = self.load().await?;
        deep_merge(&mut settings, partial);
        self.save(&settings).await?;
        Ok(SettingsEnvelope::new(settings))
    }
}

/// 内存存储（不落盘）
#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Value>,
}

impl MemorySettingsStore {
    pub fn new(initial: Value) -> Self {
        Self {
            settings: Mutex::new(initial),
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn read(&self) -> Result<SettingsEnvelope, SettingsError> {
        let settings = self.settings.lock().await;
        let value = if settings.is_null() {
            Value::Object(Map::new())
        } else {
            settings.clone()
        };
        Ok(SettingsEnvelope::new(value))
    }

    async fn update(&self, partial: Value) -> Result<SettingsEnvelope, SettingsError> {
        if !partial.is_object() {
            return Err(SettingsError::InvalidPatch);
        }

        let mut settings = self.settings.lock().await;
        if !settings.is_object() {
            *settings = Value::Object(Map::new());
        }
        deep_merge(&mut *settings, partial);
        Ok(SettingsEnvelope::new(settings.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_settings_path() -> PathBuf {
        std::env::temp_dir()
            .join(format!("stack-deck-test-{}", uuid::Uuid::new_v4()))
            .join("settings.json")
    }

    #[test]
    fn test_deep_merge_nested() {
        let mut base = json!({"build": {"env": {"A": "1"}, "parallel": false}, "theme": "dark"});
        deep_merge(
            &mut base,
            json!({"build": {"env": {"B": "2"}}, "theme": "light"}),
        );
        assert_eq!(
            base,
            json!({"build": {"env": {"A": "1", "B": "2"}, "parallel": false}, "theme": "light"})
        );
    }

    #[test]
    fn test_deep_merge_replaces_non_objects() {
        let mut base = json!({"ports": [1, 2], "engine": {"socket": "/a"}});
        deep_merge(&mut base, json!({"ports": [3], "engine": "off"}));
        assert_eq!(base, json!({"ports": [3], "engine": "off"}));
    }

    #[tokio::test]
    async fn test_file_store_missing_file_reads_empty() {
        let store = JsonFileSettingsStore::new(temp_settings_path());
        let envelope = store.read().await.unwrap();
        assert!(envelope.ok);
        assert_eq!(envelope.settings, json!({}));
    }

    #[tokio::test]
    async fn test_file_store_update_persists() {
        let path = temp_settings_path();
        let store = JsonFileSettingsStore::new(&path);

        store
            .update(json!({"concurrency": {"workers": 2}}))
            .await
            .unwrap();
        let merged = store
            .update(json!({"concurrency": {"retries": 1}}))
            .await
            .unwrap();
        assert_eq!(
            merged.settings,
            json!({"concurrency": {"workers": 2, "retries": 1}})
        );

        // 重新打开文件仍然能读到
        let reopened = JsonFileSettingsStore::new(&path);
        assert_eq!(reopened.read().await.unwrap().settings, merged.settings);
        assert!(!path.with_extension("json.tmp").exists());

        if let Some(dir) = path.parent() {
            let _ = std::fs::remove_dir_all(dir);
        }
    }

    #[tokio::test]
    async fn test_rejects_non_object_patch() {
        let store = MemorySettingsStore::default();
        assert!(matches!(
            store.update(json!([1, 2])).await,
            Err(SettingsError::InvalidPatch)
        ));
    }

    #[tokio::test]
    async fn test_memory_store_merge() {
        let store = MemorySettingsStore::new(json!({"a": {"b": 1}}));
        let envelope = store.update(json!({"a": {"c": 2}})).await.unwrap();
        assert_eq!(envelope.settings, json!({"a": {"b": 1, "c": 2}}));
    }
}
