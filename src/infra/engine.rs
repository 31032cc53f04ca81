//! Container engine adapter
//!
//! `EngineClient` 是其余模块使用的接口；`DockerCli` 通过 `docker` CLI 实现

use async_trait::async_trait;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::env::constants::ENGINE_COMMAND_TIMEOUT_SECS;
use crate::domain::build::ProgressUpdate;
use crate::domain::container::ContainerInfo;
use crate::domain::launch::ContainerLaunchSpec;
use crate::domain::service::Service;

use super::command::{CommandError, CommandRunner, OutputStream};

/// Engine operation errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine command `{command}` failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Container '{0}' not found")]
    NotFound(String),

    #[error("Build for '{service}' failed with exit code {exit_code}")]
    BuildFailed { service: String, exit_code: i32 },

    #[error("Engine command timed out")]
    Timeout,

    #[error("Build cancelled")]
    Cancelled,

    #[error("Unexpected engine output: {0}")]
    Parse(String),
}

impl From<CommandError> for EngineError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::Cancelled => EngineError::Cancelled,
            CommandError::Timeout => EngineError::Timeout,
            other => EngineError::Unavailable(other.to_string()),
        }
    }
}

/// Receives build progress as soon as the engine produces it
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn progress(&self, update: ProgressUpdate);
}

/// One service build
pub struct BuildJob<'a> {
    pub service: &'a Service,
    /// Launch spec of the builder container
    pub spec: &'a ContainerLaunchSpec,
}

/// Result of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub container_id: String,
    pub exit_code: i32,
    pub duration_ms: i64,
}

/// Container engine control API
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// All containers known to the engine, as reported
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, EngineError>;

    /// Create a container, returning its id
    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerLaunchSpec,
    ) -> Result<String, EngineError>;

    async fn start_container(&self, id: &str) -> Result<(), EngineError>;

    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo, EngineError>;

    /// Run one service build, forwarding every output line to `sink`.
    ///
    /// Cancelling `cancel` must stop the in-flight build and return
    /// `EngineError::Cancelled`.
    async fn build(
        &self,
        job: BuildJob<'_>,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<BuildReport, EngineError>;
}

const PS_FORMAT: &str =
    "{{.ID}}|{{.Names}}|{{.Image}}|{{.Status}}|{{.State}}|{{.CreatedAt}}|{{.Ports}}";
const INSPECT_FORMAT: &str =
    "{{.Id}}|{{.Name}}|{{.Config.Image}}|{{.State.Status}}|{{.State.Status}}|{{.Created}}|";

/// `docker` CLI backed engine client
pub struct DockerCli {
    program: String,
    command_timeout: Duration,
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            command_timeout: Duration::from_secs(ENGINE_COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Run a short engine command and return its trimmed stdout
    async fn exec(&self, args: Vec<String>) -> Result<String, EngineError> {
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, "Running engine command");

        let output = CommandRunner::run_simple(&self.program, &args, self.command_timeout).await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(EngineError::CommandFailed { command, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn remove_container(&self, id: &str) {
        if let Err(e) = self
            .exec(vec!["rm".into(), "-f".into(), id.to_string()])
            .await
        {
            warn!(container = %id, error = %e, "Failed to remove builder container");
        }
    }

    /// `docker create`，不设超时
    ///
    /// 本地没有镜像时 create 会先拉取，拉取输出在 stderr 上，转发给 `sink`。
    /// 容器 id 取 stdout 的最后一个非空行
    async fn create_streamed(
        &self,
        name: &str,
        spec: &ContainerLaunchSpec,
        sink: Option<(&str, &dyn ProgressSink)>,
        cancel: CancellationToken,
    ) -> Result<String, EngineError> {
        let args = create_args(name, spec);
        let command = format!("{} {}", self.program, args.join(" "));
        debug!(%command, "Running engine command");

        let (line_tx, mut line_rx) = mpsc::channel(64);
        let run = CommandRunner::run_with_streaming(&self.program, &args, line_tx, cancel, None);
        let collect = async {
            let mut stdout = Vec::new();
            let mut stderr = Vec::new();
            while let Some(output) = line_rx.recv().await {
                match output.stream {
                    OutputStream::Stdout => stdout.push(output.line),
                    OutputStream::Stderr => {
                        if let Some((service, sink)) = sink {
                            let update = ProgressUpdate::new(service, "pull")
                                .with_message(output.line.clone());
                            sink.progress(update).await;
                        }
                        stderr.push(output.line);
                    }
                }
            }
            (stdout, stderr)
        };
        let (status, (stdout, stderr)) = tokio::join!(run, collect);

        if !status?.success() {
            return Err(EngineError::CommandFailed {
                command,
                stderr: stderr.join("\n").trim().to_string(),
            });
        }
        stdout
            .iter()
            .rev()
            .map(|l| l.trim())
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| EngineError::Parse(format!("no container id for '{}'", name)))
    }
}

/// Arguments for `docker create`
pub fn create_args(name: &str, spec: &ContainerLaunchSpec) -> Vec<String> {
    let mut args = vec!["create".to_string(), "--name".to_string(), name.to_string()];
    for pair in spec.env_pairs() {
        args.push("-e".to_string());
        args.push(pair);
    }
    for bind in &spec.host_config.binds {
        args.push("-v".to_string());
        args.push(bind.clone());
    }
    args.push(spec.image.clone());
    args
}

/// Builder container name for a service
pub fn builder_container_name(service: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("stack-build-{}-{}", service, &suffix[..8])
}

fn map_not_found(id: &str, e: EngineError) -> EngineError {
    match e {
        EngineError::CommandFailed { ref stderr, .. } if stderr.contains("No such") => {
            EngineError::NotFound(id.to_string())
        }
        other => other,
    }
}

#[async_trait]
impl EngineClient for DockerCli {
    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, EngineError> {
        let stdout = self
            .exec(vec![
                "ps".into(),
                "-a".into(),
                "--format".into(),
                PS_FORMAT.into(),
            ])
            .await?;

        Ok(stdout
            .lines()
            .filter(|line| !line.is_empty())
            .map(ContainerInfo::from_ps_line)
            .collect())
    }

    async fn create_container(
        &self,
        name: &str,
        spec: &ContainerLaunchSpec,
    ) -> Result<String, EngineError> {
        self.create_streamed(name, spec, None, CancellationToken::new())
            .await
    }

    async fn start_container(&self, id: &str) -> Result<(), EngineError> {
        self.exec(vec!["start".into(), id.to_string()])
            .await
            .map(|_| ())
            .map_err(|e| map_not_found(id, e))
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInfo, EngineError> {
        let stdout = self
            .exec(vec![
                "inspect".into(),
                "--format".into(),
                INSPECT_FORMAT.into(),
                id.to_string(),
            ])
            .await
            .map_err(|e| map_not_found(id, e))?;

        let line = stdout
            .lines()
            .next()
            .ok_or_else(|| EngineError::Parse(format!("empty inspect output for '{}'", id)))?;
        Ok(ContainerInfo::from_ps_line(line))
    }

    async fn build(
        &self,
        job: BuildJob<'_>,
        sink: &dyn ProgressSink,
        cancel: CancellationToken,
    ) -> Result<BuildReport, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let started = Instant::now();
        let service = job.service.name.as_str();
        let name = builder_container_name(service);

        let container_id = match self
            .create_streamed(&name, job.spec, Some((service, sink)), cancel.clone())
            .await
        {
            Ok(id) => id,
            Err(e) => {
                // create 失败或被取消时容器可能已经存在，按名字清理
                self.remove_container(&name).await;
                return Err(e);
            }
        };
        info!(service, container = %name, "Builder container created");
        sink.progress(
            ProgressUpdate::new(service, "container").with_message(format!(
                "Builder container {} created from {}",
                name, job.spec.image
            )),
        )
        .await;

        // 附着到构建容器并实时转发输出
        let (line_tx, mut line_rx) = mpsc::channel(64);
        let args = vec!["start".to_string(), "-a".to_string(), container_id.clone()];
        let run =
            CommandRunner::run_with_streaming(&self.program, &args, line_tx, cancel.clone(), None);
        let forward = async {
            while let Some(output) = line_rx.recv().await {
                sink.progress(ProgressUpdate::from_output_line(service, &output.line))
                    .await;
            }
        };
        let (result, ()) = tokio::join!(run, forward);

        // 附着进程被杀掉并不会停止容器，这里统一清理
        self.remove_container(&container_id).await;

        let status = result.map_err(EngineError::from)?;
        let exit_code = status.code().unwrap_or(-1);
        if exit_code != 0 {
            return Err(EngineError::BuildFailed {
                service: service.to_string(),
                exit_code,
            });
        }

        Ok(BuildReport {
            container_id,
            exit_code,
            duration_ms: started.elapsed().as_millis() as i64,
        })
    }
}
