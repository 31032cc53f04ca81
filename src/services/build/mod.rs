//! 构建编排
//!
//! 按顺序逐个构建服务，失败即停；所有通知都经由 `BuildReporter` 的同一个有序通道发出

pub mod reporter;

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::domain::build::{
    BuildOptions, BuildOutcome, BuildSummary, LogLevel, ServiceBuildSummary,
};
use crate::domain::container::LifecycleStatus;
use crate::domain::service::Service;
use crate::infra::engine::{BuildJob, EngineClient, EngineError};
use crate::state::HistoryLog;

use super::launch::ContainerOptionsBuilder;

pub use reporter::BuildReporter;

/// 一次构建请求
#[derive(Clone, Debug)]
pub struct BuildPlan {
    pub services: Vec<Service>,
    pub options: BuildOptions,
}

impl BuildPlan {
    pub fn service_names(&self) -> Vec<String> {
        self.services.iter().map(|s| s.name.clone()).collect()
    }
}

/// 从运行时设置读取的启动参数
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchOverrides {
    /// `engine.socket`
    pub engine_socket: Option<String>,
    /// `build.env`
    pub build_env: BTreeMap<String, String>,
}

impl LaunchOverrides {
    pub fn from_settings(settings: &Value) -> Self {
        let engine_socket = settings
            .pointer("/engine/socket")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from);

        let build_env = settings
            .pointer("/build/env")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| {
                        let value = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), value)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            engine_socket,
            build_env,
        }
    }
}

/// 构建编排器（每个请求一个）
pub struct BuildOrchestrator {
    engine: Arc<dyn EngineClient>,
    history: Arc<HistoryLog>,
    launcher: ContainerOptionsBuilder,
    builder_image: String,
    build_env: BTreeMap<String, String>,
}

impl BuildOrchestrator {
    pub fn new(
        engine: Arc<dyn EngineClient>,
        history: Arc<HistoryLog>,
        launcher: ContainerOptionsBuilder,
        builder_image: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            history,
            launcher,
            builder_image: builder_image.into(),
            build_env: BTreeMap::new(),
        }
    }

    pub fn with_build_env(mut self, build_env: BTreeMap<String, String>) -> Self {
        self.build_env = build_env;
        self
    }

    /// 构建容器的环境变量
    fn builder_env(&self, service: &Service, options: &BuildOptions) -> BTreeMap<String, String> {
        let mut env = self.build_env.clone();
        env.insert("STACK_SERVICE".to_string(), service.name.clone());
        env.insert("STACK_SERVICE_GROUP".to_string(), service.group.clone());
        env.insert("STACK_TARGET_IMAGE".to_string(), service.image.clone());
        env.insert(
            "STACK_NO_CACHE".to_string(),
            options.use_no_cache.to_string(),
        );
        env
    }

    /// 执行构建计划
    ///
    /// 首个事件总是 `start`，最后一个总是 `complete`
    pub async fn run(
        &self,
        plan: BuildPlan,
        reporter: BuildReporter,
        cancel: CancellationToken,
    ) -> BuildOutcome {
        let started = Instant::now();
        let request_id = reporter.request_id().to_string();
        let total = plan.services.len();

        reporter
            .start(plan.service_names(), plan.options.clone())
            .await;
        tracing::info!(request_id = %request_id, services = total, "Build started");

        let mut summaries: Vec<ServiceBuildSummary> = Vec::with_capacity(total);

        for (index, service) in plan.services.iter().enumerate() {
            if cancel.is_cancelled() {
                tracing::warn!(
                    request_id = %request_id,
                    service = %service.name,
                    "Build cancelled before service started"
                );
                reporter
                    .log(
                        LogLevel::Warn,
                        format!("Build cancelled before {}", service.name),
                    )
                    .await;

                let outcome =
                    BuildOutcome::failure("Build cancelled", Some(summary(summaries, started)));
                reporter.complete(outcome.clone()).await;
                return outcome;
            }

            reporter
                .log(
                    LogLevel::Info,
                    format!("Building {} ({}/{})", service.name, index + 1, total),
                )
                .await;
            self.history
                .push(&service.name, LifecycleStatus::BuildStarted, None)
                .await;

            let env = self.builder_env(service, &plan.options);
            let spec = self.launcher.build(&service.name, &self.builder_image, &env);
            let job = BuildJob {
                service,
                spec: &spec,
            };

            match self.engine.build(job, &reporter, cancel.clone()).await {
                Ok(report) => {
                    self.history
                        .push(&service.name, LifecycleStatus::BuildSucceeded, None)
                        .await;
                    reporter
                        .log(
                            LogLevel::Success,
                            format!("{} built in {} ms", service.name, report.duration_ms),
                        )
                        .await;
                    summaries.push(ServiceBuildSummary {
                        service: service.name.clone(),
                        image: service.image.clone(),
                        exit_code: report.exit_code,
                        duration_ms: report.duration_ms,
                    });
                }
                Err(EngineError::Cancelled) => {
                    self.history
                        .push(
                            &service.name,
                            LifecycleStatus::BuildCancelled,
                            Some("client disconnected".to_string()),
                        )
                        .await;
                    tracing::warn!(
                        request_id = %request_id,
                        service = %service.name,
                        "Build cancelled, client disconnected"
                    );
                    reporter
                        .log(LogLevel::Warn, format!("Build of {} cancelled", service.name))
                        .await;

                    let outcome = BuildOutcome::failure(
                        "Build cancelled",
                        Some(summary(summaries, started)),
                    );
                    reporter.complete(outcome.clone()).await;
                    return outcome;
                }
                Err(e) => {
                    self.history
                        .push(
                            &service.name,
                            LifecycleStatus::BuildFailed,
                            Some(e.to_string()),
                        )
                        .await;
                    tracing::error!(
                        request_id = %request_id,
                        service = %service.name,
                        error = %e,
                        "Build failed"
                    );
                    reporter
                        .log(LogLevel::Error, format!("{} failed: {}", service.name, e))
                        .await;

                    let skipped: Vec<&str> = plan.services[index + 1..]
                        .iter()
                        .map(|s| s.name.as_str())
                        .collect();
                    if !skipped.is_empty() {
                        reporter
                            .log(
                                LogLevel::Warn,
                                format!("Skipping remaining services: {}", skipped.join(", ")),
                            )
                            .await;
                    }

                    let outcome =
                        BuildOutcome::failure(e.to_string(), Some(summary(summaries, started)));
                    reporter.complete(outcome.clone()).await;
                    return outcome;
                }
            }
        }

        tracing::info!(
            request_id = %request_id,
            duration_ms = started.elapsed().as_millis() as u64,
            "Build finished"
        );
        let outcome = BuildOutcome::success(summary(summaries, started));
        reporter.complete(outcome.clone()).await;
        outcome
    }
}

fn summary(services: Vec<ServiceBuildSummary>, started: Instant) -> BuildSummary {
    BuildSummary {
        services,
        duration_ms: started.elapsed().as_millis() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::build::{BuildEvent, ProgressUpdate};
    use crate::domain::container::ContainerInfo;
    use crate::domain::endpoint::Platform;
    use crate::domain::launch::ContainerLaunchSpec;
    use crate::infra::engine::{BuildReport, ProgressSink};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// 按服务名决定结果的假引擎
    #[derive(Default)]
    struct ScriptedEngine {
        fail: Vec<&'static str>,
        hang: Vec<&'static str>,
        built: Mutex<Vec<String>>,
        envs: Mutex<Vec<BTreeMap<String, String>>>,
    }

    #[async_trait]
    impl EngineClient for ScriptedEngine {
        async fn list_containers(&self) -> Result<Vec<ContainerInfo>, EngineError> {
            Ok(Vec::new())
        }

        async fn create_container(
            &self,
            name: &str,
            _spec: &ContainerLaunchSpec,
        ) -> Result<String, EngineError> {
            Ok(name.to_string())
        }

        async fn start_container(&self, _id: &str) -> Result<(), EngineError> {
            Ok(())
        }

        async fn inspect_container(&self, id: &str) -> Result<ContainerInfo, EngineError> {
            Err(EngineError::NotFound(id.to_string()))
        }

        async fn build(
            &self,
            job: BuildJob<'_>,
            sink: &dyn ProgressSink,
            cancel: CancellationToken,
        ) -> Result<BuildReport, EngineError> {
            let name = job.service.name.clone();
            self.built.lock().unwrap().push(name.clone());
            self.envs.lock().unwrap().push(job.spec.env.clone());

            sink.progress(ProgressUpdate::new(&name, "compile").with_message("compiling"))
                .await;

            if self.hang.contains(&name.as_str()) {
                cancel.cancelled().await;
                return Err(EngineError::Cancelled);
            }
            if self.fail.contains(&name.as_str()) {
                return Err(EngineError::BuildFailed {
                    service: name,
                    exit_code: 2,
                });
            }
            Ok(BuildReport {
                container_id: format!("{}-builder", name),
                exit_code: 0,
                duration_ms: 5,
            })
        }
    }

    fn plan(names: &[&str]) -> BuildPlan {
        BuildPlan {
            services: names
                .iter()
                .map(|n| Service::new(*n, "core", format!("stack/{}:latest", n)))
                .collect(),
            options: BuildOptions { use_no_cache: true },
        }
    }

    fn orchestrator(engine: Arc<ScriptedEngine>, history: Arc<HistoryLog>) -> BuildOrchestrator {
        let detector = || vec!["/var/run/docker.sock".to_string()];
        let launcher = ContainerOptionsBuilder::new(Arc::new(detector), Platform::Linux);
        BuildOrchestrator::new(engine, history, launcher, "stack-builder:test")
    }

    async fn drain(mut rx: mpsc::Receiver<BuildEvent>) -> Vec<BuildEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_successful_build_event_order() {
        let engine = Arc::new(ScriptedEngine::default());
        let history = Arc::new(HistoryLog::new());
        let (tx, rx) = mpsc::channel(64);

        let outcome = orchestrator(engine.clone(), history.clone())
            .run(
                plan(&["warden", "relay"]),
                BuildReporter::new("req", tx),
                CancellationToken::new(),
            )
            .await;
        assert!(outcome.ok);
        assert_eq!(outcome.summary.as_ref().unwrap().services.len(), 2);

        let events = drain(rx).await;
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "start", "log", "progress", "log", "log", "progress", "log", "complete"
            ]
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

        let statuses: Vec<_> = history.entries().await.iter().map(|e| e.status).collect();
        assert_eq!(
            statuses,
            vec![
                LifecycleStatus::BuildStarted,
                LifecycleStatus::BuildSucceeded,
                LifecycleStatus::BuildStarted,
                LifecycleStatus::BuildSucceeded,
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_fast_skips_remaining() {
        let engine = Arc::new(ScriptedEngine {
            fail: vec!["ledger"],
            ..Default::default()
        });
        let history = Arc::new(HistoryLog::new());
        let (tx, rx) = mpsc::channel(64);

        let outcome = orchestrator(engine.clone(), history)
            .run(
                plan(&["warden", "ledger", "relay"]),
                BuildReporter::new("req", tx),
                CancellationToken::new(),
            )
            .await;
        assert!(!outcome.ok);
        assert_eq!(*engine.built.lock().unwrap(), vec!["warden", "ledger"]);

        let events = drain(rx).await;
        match events.last() {
            Some(BuildEvent::Complete(o)) => assert!(!o.ok),
            other => panic!("expected complete, got {:?}", other),
        }
        assert!(events.iter().any(|e| matches!(
            e,
            BuildEvent::Log { level: LogLevel::Warn, message } if message.contains("relay")
        )));
    }

    #[tokio::test]
    async fn test_cancel_records_history() {
        let engine = Arc::new(ScriptedEngine {
            hang: vec!["warden"],
            ..Default::default()
        });
        let history = Arc::new(HistoryLog::new());
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let orchestrator = orchestrator(engine, history.clone());
        let run = orchestrator.run(plan(&["warden"]), BuildReporter::new("req", tx), cancel);
        let cancel_soon = async {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        };
        let (outcome, _) = tokio::join!(run, cancel_soon);

        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("Build cancelled"));
        let last = history.entries().await.pop().unwrap();
        assert_eq!(last.status, LifecycleStatus::BuildCancelled);
        assert!(drain(rx).await.last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_cancelled_before_first_service_builds_nothing() {
        let engine = Arc::new(ScriptedEngine::default());
        let history = Arc::new(HistoryLog::new());
        let (tx, rx) = mpsc::channel(64);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = orchestrator(engine.clone(), history.clone())
            .run(
                plan(&["warden", "relay"]),
                BuildReporter::new("req", tx),
                cancel,
            )
            .await;

        assert!(!outcome.ok);
        assert_eq!(outcome.error.as_deref(), Some("Build cancelled"));
        assert!(engine.built.lock().unwrap().is_empty());
        assert!(history.entries().await.is_empty());

        let kinds: Vec<_> = drain(rx).await.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["start", "log", "complete"]);
    }

    #[tokio::test]
    async fn test_builder_env() {
        let engine = Arc::new(ScriptedEngine::default());
        let (tx, _rx) = mpsc::channel(64);

        orchestrator(engine.clone(), Arc::new(HistoryLog::new()))
            .with_build_env(BTreeMap::from([(
                "CARGO_PROFILE".to_string(),
                "release".to_string(),
            )]))
            .run(
                plan(&["warden"]),
                BuildReporter::new("req", tx),
                CancellationToken::new(),
            )
            .await;

        let envs = engine.envs.lock().unwrap();
        let env = &envs[0];
        assert_eq!(env["STACK_SERVICE"], "warden");
        assert_eq!(env["STACK_SERVICE_GROUP"], "core");
        assert_eq!(env["STACK_TARGET_IMAGE"], "stack/warden:latest");
        assert_eq!(env["STACK_NO_CACHE"], "true");
        assert_eq!(env["CARGO_PROFILE"], "release");
        assert_eq!(env["ENGINE_SOCKET_CANDIDATES"], "/var/run/docker.sock");
    }

    #[test]
    fn test_launch_overrides_from_settings() {
        let overrides = LaunchOverrides::from_settings(&json!({
            "engine": {"socket": "unix:///tmp/engine.sock"},
            "build": {"env": {"A": "1", "JOBS": 4, "SKIP": null}}
        }));
        assert_eq!(
            overrides.engine_socket.as_deref(),
            Some("unix:///tmp/engine.sock")
        );
        assert_eq!(
            overrides.build_env,
            BTreeMap::from([
                ("A".to_string(), "1".to_string()),
                ("JOBS".to_string(), "4".to_string()),
            ])
        );

        assert_eq!(
            LaunchOverrides::from_settings(&json!({})),
            LaunchOverrides::default()
        );
    }
}
