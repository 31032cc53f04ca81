//! 构建相关领域模型

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 构建选项
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildOptions {
    #[serde(default)]
    pub use_no_cache: bool,
}

/// 日志级别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
}

/// 构建进度
///
/// 引擎每输出一行就产生一条；如果输出本身是 JSON 对象则原样放进 `data`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub service: String,
    pub step: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ProgressUpdate {
    pub fn new(service: impl Into<String>, step: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            step: step.into(),
            message: None,
            data: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// 把构建容器输出的一行转换为进度
    ///
    /// JSON 对象行读取其中的 `step`（缺省为 `output`），其他行作为纯文本 message
    pub fn from_output_line(service: &str, line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed.starts_with('{') {
            if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(trimmed) {
                let step = obj
                    .get("step")
                    .and_then(Value::as_str)
                    .unwrap_or("output")
                    .to_string();
                return Self::new(service, step).with_data(Value::Object(obj));
            }
        }
        Self::new(service, "output").with_message(line)
    }
}

/// 单个服务的构建结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceBuildSummary {
    pub service: String,
    pub image: String,
    pub exit_code: i32,
    pub duration_ms: i64,
}

/// 整个构建请求的汇总
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildSummary {
    pub services: Vec<ServiceBuildSummary>,
    pub duration_ms: i64,
}

/// 构建请求的最终结果
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BuildSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildOutcome {
    pub fn success(summary: BuildSummary) -> Self {
        Self {
            ok: true,
            summary: Some(summary),
            error: None,
        }
    }

    /// 失败结果，已完成服务的汇总仍然保留
    pub fn failure(error: impl Into<String>, summary: Option<BuildSummary>) -> Self {
        Self {
            ok: false,
            summary,
            error: Some(error.into()),
        }
    }
}

/// 构建事件流中的一条记录
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildEvent {
    Start {
        services: Vec<String>,
        options: BuildOptions,
    },
    Progress(ProgressUpdate),
    Log {
        level: LogLevel,
        message: String,
    },
    Complete(BuildOutcome),
}

impl BuildEvent {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        BuildEvent::Log {
            level,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BuildEvent::Start { .. } => "start",
            BuildEvent::Progress(_) => "progress",
            BuildEvent::Log { .. } => "log",
            BuildEvent::Complete(_) => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildEvent::Complete(_))
    }

    /// 序列化为一行 NDJSON（带换行）
    pub fn to_ndjson(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|e| {
            serde_json::json!({
                "type": "log",
                "level": "error",
                "message": format!("Failed to encode build event: {}", e),
            })
            .to_string()
        });
        line.push('\n');
        line
    }
}
