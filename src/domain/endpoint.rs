//! 引擎连接端点模型
//!
//! 命名管道与 Unix socket 统一建模为 `{kind, path}`，在解析时一次性规范化

use serde::{Deserialize, Serialize};

/// 命名管道的 URI 前缀
pub const NPIPE_SCHEME: &str = "npipe://";
/// Unix socket 的 URI 前缀
pub const UNIX_SCHEME: &str = "unix://";

/// Windows 下引擎守护进程的默认命名管道
pub const DEFAULT_WINDOWS_PIPE: &str = "//./pipe/docker_engine";
/// 其他平台的默认 Unix socket
pub const DEFAULT_UNIX_SOCKET: &str = "/var/run/docker.sock";
/// 容器内固定的 socket 挂载路径
pub const CONTAINER_SOCKET_PATH: &str = "/var/run/docker.sock";

/// 宿主平台
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Windows,
    Linux,
    MacOs,
    Other(String),
}

impl Platform {
    /// 从平台标识解析（兼容 `win32` / `darwin` 这类写法）
    pub fn from_id(id: &str) -> Self {
        match id.trim().to_ascii_lowercase().as_str() {
            "win32" | "windows" => Platform::Windows,
            "linux" => Platform::Linux,
            "darwin" | "macos" => Platform::MacOs,
            other => Platform::Other(other.to_string()),
        }
    }

    /// 当前进程所在平台
    pub fn current() -> Self {
        Self::from_id(std::env::consts::OS)
    }

    pub fn is_windows(&self) -> bool {
        matches!(self, Platform::Windows)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Platform::Windows => "windows",
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Other(id) => id.as_str(),
        }
    }
}

/// 端点类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    NamedPipe,
    UnixSocket,
}

/// 引擎端点地址
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointAddress {
    pub kind: EndpointKind,
    /// 宿主机侧的本地路径（已去除 scheme）
    pub path: String,
}

impl EndpointAddress {
    pub fn named_pipe(path: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::NamedPipe,
            path: path.into(),
        }
    }

    pub fn unix_socket(path: impl Into<String>) -> Self {
        Self {
            kind: EndpointKind::UnixSocket,
            path: path.into(),
        }
    }

    /// 平台默认端点
    pub fn platform_default(platform: &Platform) -> Self {
        if platform.is_windows() {
            Self::named_pipe(DEFAULT_WINDOWS_PIPE)
        } else {
            Self::unix_socket(DEFAULT_UNIX_SOCKET)
        }
    }

    /// 解析探测到的端点
    ///
    /// `npipe://` 前缀被剥离成 UNC 风格路径，其余地址原样使用
    pub fn parse(raw: &str) -> Self {
        let path = raw.strip_prefix(NPIPE_SCHEME).unwrap_or(raw);
        Self::from_path(path)
    }

    /// 解析显式覆盖值
    ///
    /// 覆盖值可带任意 `scheme://` 前缀，剥离后作为不透明路径使用
    pub fn parse_override(raw: &str) -> Self {
        let path = match raw.split_once("://") {
            Some((scheme, rest)) if is_scheme(scheme) => rest,
            _ => raw,
        };
        Self::from_path(path)
    }

    fn from_path(path: &str) -> Self {
        if is_pipe_path(path) {
            Self::named_pipe(path)
        } else {
            Self::unix_socket(path)
        }
    }
}

impl std::fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.path)
    }
}

fn is_pipe_path(path: &str) -> bool {
    path.starts_with("//./pipe/") || path.starts_with(r"\\.\pipe\")
}

fn is_scheme(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// 宿主机与容器之间的 socket 绑定
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SocketBinding {
    pub host_path: String,
    pub container_path: String,
    pub kind: EndpointKind,
}

impl SocketBinding {
    pub fn new(endpoint: &EndpointAddress) -> Self {
        Self {
            host_path: endpoint.path.clone(),
            container_path: CONTAINER_SOCKET_PATH.to_string(),
            kind: endpoint.kind,
        }
    }

    /// `host:container` 形式的 bind 字符串
    pub fn to_bind(&self) -> String {
        format!("{}:{}", self.host_path, self.container_path)
    }
}
