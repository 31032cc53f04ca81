//! 命令执行器
//!
//! 提供统一的命令执行接口，支持：
//! - 实时逐行输出
//! - 可选超时
//! - 取消支持
//! - stdout/stderr 分离

use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// 命令执行器
pub struct CommandRunner;

/// 输出流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// 一行命令输出
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub line: String,
}

/// 命令执行错误
#[derive(Debug)]
pub enum CommandError {
    /// 命令启动失败
    SpawnFailed(std::io::Error),
    /// 命令超时
    Timeout,
    /// 命令被取消
    Cancelled,
    /// 等待命令完成失败
    WaitFailed(std::io::Error),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::SpawnFailed(e) => write!(f, "Failed to spawn command: {}", e),
            CommandError::Timeout => write!(f, "Command timed out"),
            CommandError::Cancelled => write!(f, "Command was cancelled"),
            CommandError::WaitFailed(e) => write!(f, "Failed to wait for command: {}", e),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::SpawnFailed(e) | CommandError::WaitFailed(e) => Some(e),
            _ => None,
        }
    }
}

impl CommandRunner {
    /// 执行命令并逐行转发输出
    ///
    /// # Arguments
    /// * `program` - 要执行的程序
    /// * `args` - 命令行参数
    /// * `line_tx` - 输出行发送通道，调用方需要同时消费
    /// * `cancel` - 取消令牌
    /// * `timeout` - 超时时间，`None` 表示不限时
    pub async fn run_with_streaming(
        program: &str,
        args: &[String],
        line_tx: mpsc::Sender<OutputLine>,
        cancel: CancellationToken,
        timeout: Option<Duration>,
    ) -> Result<ExitStatus, CommandError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(CommandError::SpawnFailed)?;

        let stdout_task = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, OutputStream::Stdout, line_tx.clone())));
        let stderr_task = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, OutputStream::Stderr, line_tx.clone())));
        drop(line_tx);

        let deadline = async {
            match timeout {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        // 等待命令完成，支持超时和取消
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                warn!(program, "Command cancelled, killing process");
                let _ = child.kill().await;
                Err(CommandError::Cancelled)
            }
            _ = deadline => {
                error!(program, "Command timed out after {:?}", timeout);
                let _ = child.kill().await;
                Err(CommandError::Timeout)
            }
            status = child.wait() => status.map_err(CommandError::WaitFailed),
        };

        // 等待输出读取完成
        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        result
    }

    /// 执行简单命令（无流式输出）
    ///
    /// 用于 ps / inspect / start / rm 这类很快返回的引擎命令
    pub async fn run_simple(
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<Output, CommandError> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        tokio::select! {
            result = child => result.map_err(CommandError::SpawnFailed),
            _ = tokio::time::sleep(timeout) => Err(CommandError::Timeout),
        }
    }
}

async fn forward_lines<R>(reader: R, stream: OutputStream, tx: mpsc::Sender<OutputLine>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if tx.send(OutputLine { stream, line }).await.is_err() {
            break;
        }
    }
}
