//! 构建事件发送器
//!
//! 每个构建请求独占一个有序通道；`complete` 消费 reporter，保证终止事件只发一次

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::domain::build::{BuildEvent, BuildOptions, BuildOutcome, LogLevel, ProgressUpdate};
use crate::infra::engine::ProgressSink;

pub struct BuildReporter {
    request_id: String,
    tx: mpsc::Sender<BuildEvent>,
    completed: bool,
}

impl BuildReporter {
    pub fn new(request_id: impl Into<String>, tx: mpsc::Sender<BuildEvent>) -> Self {
        Self {
            request_id: request_id.into(),
            tx,
            completed: false,
        }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// 客户端是否已经断开
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// 发送事件，通道满时等待
    pub async fn emit(&self, event: BuildEvent) {
        if self.tx.send(event).await.is_err() {
            debug!(request_id = %self.request_id, "Build stream receiver dropped");
        }
    }

    pub async fn start(&self, services: Vec<String>, options: BuildOptions) {
        self.emit(BuildEvent::Start { services, options }).await;
    }

    pub async fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(BuildEvent::log(level, message)).await;
    }

    /// 发送终止事件
    pub async fn complete(mut self, outcome: BuildOutcome) {
        self.completed = true;
        self.emit(BuildEvent::Complete(outcome)).await;
    }
}

#[async_trait]
impl ProgressSink for BuildReporter {
    async fn progress(&self, update: ProgressUpdate) {
        self.emit(BuildEvent::Progress(update)).await;
    }
}

impl Drop for BuildReporter {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        warn!(request_id = %self.request_id, "Build reporter dropped without a result");
        let outcome = BuildOutcome::failure("Build ended unexpectedly", None);
        if let Err(e) = self.tx.try_send(BuildEvent::Complete(outcome)) {
            warn!(
                request_id = %self.request_id,
                error = %e,
                "Failed to deliver terminal build event"
            );
        }
    }
}
