//! 容器与生命周期历史模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 引擎报告的容器信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub status: String,
    pub state: String,
    pub created: String,
    pub ports: Vec<String>,
}

impl ContainerInfo {
    /// 解析 `id|name|image|status|state|created|ports` 格式的一行
    pub fn from_ps_line(line: &str) -> Self {
        let parts: Vec<&str> = line.split('|').collect();
        ContainerInfo {
            id: parts.first().unwrap_or(&"").to_string(),
            name: parts
                .get(1)
                .unwrap_or(&"")
                .trim_start_matches('/')
                .to_string(),
            image: parts.get(2).unwrap_or(&"").to_string(),
            status: parts.get(3).unwrap_or(&"").to_string(),
            state: parts.get(4).unwrap_or(&"").to_string(),
            created: parts.get(5).unwrap_or(&"").to_string(),
            ports: parts
                .get(6)
                .unwrap_or(&"")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }
}

/// 生命周期事件状态
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    BuildStarted,
    BuildSucceeded,
    BuildFailed,
    BuildCancelled,
    Launched,
    LaunchFailed,
}

/// 历史记录
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub service: String,
    pub status: LifecycleStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HistoryEntry {
    pub fn new(service: impl Into<String>, status: LifecycleStatus) -> Self {
        Self {
            service: service.into(),
            status,
            timestamp: Utc::now(),
            message: None,
        }
    }
}
